//! Webhook signature verification and event parsing
//!
//! LINE signs each callback body with HMAC-SHA256 keyed by the channel
//! secret and sends the base64 digest in the `X-Line-Signature` header.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

/// Header carrying the body signature
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Text that makes the bot reply with the sender's user ID
pub const WHOAMI_COMMAND: &str = "whoami";

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Channel secret is not configured")]
    MissingSecret,
    #[error("Missing signature header")]
    MissingSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Failed to parse callback body: {0}")]
    Parse(#[from] serde_json::Error),
}

fn body_mac(channel_secret: &str, body: &[u8]) -> Result<Hmac<Sha256>, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    Ok(mac)
}

/// Compute the signature LINE would send for `body`
pub fn sign_body(channel_secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mac = body_mac(channel_secret, body)?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Check `signature` against the HMAC of `body`.
///
/// An empty channel secret verifies nothing and is refused outright.
pub fn verify_signature(
    channel_secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), WebhookError> {
    if channel_secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }
    let signature = signature.ok_or(WebhookError::MissingSignature)?;
    let expected = STANDARD
        .decode(signature.trim())
        .map_err(|_| WebhookError::InvalidSignature)?;

    body_mac(channel_secret, body)?
        .verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// Verify and parse a callback in one step
pub fn parse_request(
    channel_secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<CallbackRequest, WebhookError> {
    verify_signature(channel_secret, body, signature)?;
    Ok(serde_json::from_slice(body)?)
}

/// Webhook callback payload
#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Message(MessageEvent),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<Source>,
    pub message: MessageContent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    User {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Group {
        #[serde(rename = "groupId")]
        group_id: String,
    },
    Room {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

/// A pending reply to a `whoami` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoamiReply {
    pub reply_token: String,
    pub user_id: String,
}

impl Event {
    /// The reply to send if this event is a `whoami` text from a user
    pub fn whoami(&self) -> Option<WhoamiReply> {
        let Event::Message(event) = self else {
            return None;
        };
        let MessageContent::Text { text } = &event.message else {
            return None;
        };
        if text != WHOAMI_COMMAND {
            return None;
        }
        let Some(Source::User { user_id }) = &event.source else {
            return None;
        };
        let reply_token = event.reply_token.clone()?;

        Some(WhoamiReply {
            reply_token,
            user_id: user_id.clone(),
        })
    }
}
