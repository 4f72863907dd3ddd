use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

use crate::types::ChatMessage;

pub mod console;

/// Result of one side effect on the chat platform. Failures are reported,
/// never raised, so moderation keeps going when a platform call misbehaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Ok,
    Failed { reason: String },
}

impl ActionOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        ActionOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ActionOutcome::Ok)
    }
}

impl<E: fmt::Display> From<std::result::Result<(), E>> for ActionOutcome {
    fn from(result: std::result::Result<(), E>) -> Self {
        match result {
            Ok(()) => ActionOutcome::Ok,
            Err(e) => ActionOutcome::failed(e.to_string()),
        }
    }
}

/// Trait defining the interface a chat platform adapter must implement.
///
/// Adapters turn platform-specific message shapes into plain `ChatMessage`
/// values; nothing platform-specific reaches the dictionary engine.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Get the platform identifier (e.g., "twitch", "console")
    fn platform_name(&self) -> &str;

    /// Start receiving messages
    async fn connect(&self) -> Result<()>;

    /// Take the inbound message stream. Only the first call returns it.
    async fn take_message_receiver(&self) -> Option<mpsc::Receiver<ChatMessage>>;

    /// Send a message to the specified channel
    async fn send_message(&self, channel: &str, text: &str) -> ActionOutcome;

    /// Recall (delete) a message
    async fn delete_message(&self, channel: &str, message_id: &str) -> ActionOutcome;

    /// Mute a user for the given duration
    async fn timeout_user(
        &self,
        channel: &str,
        username: &str,
        duration_seconds: u64,
    ) -> ActionOutcome;

    /// Gracefully disconnect
    async fn disconnect(&self) -> Result<()>;
}
