//! Relay module types.

use async_trait::async_trait;
use dgbridge_core::AuthorContext;

/// Configuration of the relay pipeline.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Discord channel that is bridged to the subprocess.
    pub channel_id: String,
}

impl RelayConfig {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
        }
    }
}

/// A chat message received from the relay channel.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel_id: String,
    pub message_id: String,
    pub author_id: String,
    pub content: String,
    /// Author attributes for template directives.
    pub author: AuthorContext,
}

/// Destination for subprocess lines.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Send `text` to the channel.
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError>;
}

/// A chat message could not be delivered. Not retried.
#[derive(Debug, thiserror::Error)]
#[error("Failed to deliver message to channel {channel_id}: {reason}")]
pub struct DeliveryError {
    pub channel_id: String,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(channel_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            reason: reason.into(),
        }
    }
}
