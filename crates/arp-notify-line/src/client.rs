//! LINE Messaging API client
//!
//! Only the two calls the daemon needs: push a text message to a user, and
//! reply to a webhook event.

use arp_notify_core::Notifier;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Production API endpoint
pub const LINE_API_BASE: &str = "https://api.line.me";

/// Request timeout for API calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum LineError {
    #[error("Channel access token is empty")]
    MissingToken,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LINE API returned {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Serialize, PartialEq)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

impl<'a> TextMessage<'a> {
    fn new(text: &'a str) -> Self {
        Self { kind: "text", text }
    }
}

#[derive(Debug, Serialize)]
struct PushMessageRequest<'a> {
    to: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyMessageRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

/// Authenticated client for one LINE channel
#[derive(Clone)]
pub struct LineClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl std::fmt::Debug for LineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LineClient {
    /// Create a client for the production API
    pub fn new(access_token: impl Into<String>) -> Result<Self, LineError> {
        Self::with_base_url(access_token, LINE_API_BASE)
    }

    /// Create a client against a different API host
    pub fn with_base_url(
        access_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, LineError> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(LineError::MissingToken);
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    /// Push a text message to a user, group, or room ID
    pub async fn push_message(&self, to: &str, text: &str) -> Result<(), LineError> {
        let request = PushMessageRequest {
            to,
            messages: vec![TextMessage::new(text)],
        };
        self.post("/v2/bot/message/push", &request).await?;
        debug!(to = %to, "Pushed message");
        Ok(())
    }

    /// Reply to a webhook event with one or more text messages
    pub async fn reply_message(&self, reply_token: &str, texts: &[&str]) -> Result<(), LineError> {
        let request = ReplyMessageRequest {
            reply_token,
            messages: texts.iter().map(|t| TextMessage::new(t)).collect(),
        };
        self.post("/v2/bot/message/reply", &request).await
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), LineError> {
        let url = format!("{}{}", self.base_url, path);
        trace!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LineError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for LineClient {
    async fn send(&self, recipient: &str, message: &str) -> anyhow::Result<()> {
        self.push_message(recipient, message).await?;
        Ok(())
    }
}
