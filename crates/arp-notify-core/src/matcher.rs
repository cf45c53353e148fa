//! Presence matching against raw scan output

/// Report whether `mac` appears anywhere in the scan output.
///
/// Plain, case-sensitive substring containment. Addresses are compared
/// exactly as configured and as printed by the scanner, so the target file
/// must use the scanner's formatting. An address that is a textual prefix
/// of another device's address will also match that device.
pub fn is_present(output: &str, mac: &str) -> bool {
    output.contains(mac)
}
