//! arp-notify LINE - Messaging API integration
//!
//! This crate provides the outbound push client used to deliver arrival
//! notifications, and verification/parsing of inbound webhook callbacks.

pub mod client;
pub mod webhook;

pub use client::{LineClient, LineError, LINE_API_BASE};
pub use webhook::{
    parse_request, sign_body, verify_signature, CallbackRequest, Event, WebhookError, WhoamiReply,
    SIGNATURE_HEADER,
};
