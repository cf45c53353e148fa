//! Outbound notification boundary

use anyhow::Result;
use async_trait::async_trait;

/// Delivers a text message to a single recipient.
///
/// Implementations are called once per recipient and may fail
/// independently; callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> Result<()>;
}
