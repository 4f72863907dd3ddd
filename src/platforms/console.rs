// src/platforms/console.rs - Stdin/stdout platform for running without a chat backend

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::platforms::{ActionOutcome, ChatPlatform};
use crate::types::ChatMessage;

const CONSOLE_CHANNEL: &str = "console";

/// Reads one chat message per stdin line and prints side effects to stdout
pub struct ConsolePlatform {
    username: String,
    is_mod: bool,
    message_sender: Mutex<Option<mpsc::Sender<ChatMessage>>>,
    message_receiver: Mutex<Option<mpsc::Receiver<ChatMessage>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    next_id: Arc<AtomicU64>,
}

impl ConsolePlatform {
    pub fn new(username: impl Into<String>, is_mod: bool) -> Self {
        let (tx, rx) = mpsc::channel(256);
        Self {
            username: username.into(),
            is_mod,
            message_sender: Mutex::new(Some(tx)),
            message_receiver: Mutex::new(Some(rx)),
            reader_task: Mutex::new(None),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Build the message for one input line
    fn make_message(username: &str, is_mod: bool, id: u64, line: String) -> ChatMessage {
        ChatMessage {
            platform: "console".to_string(),
            channel: CONSOLE_CHANNEL.to_string(),
            message_id: id.to_string(),
            username: username.to_string(),
            content: line,
            timestamp: chrono::Utc::now(),
            is_mod,
        }
    }
}

#[async_trait]
impl ChatPlatform for ConsolePlatform {
    fn platform_name(&self) -> &str {
        "console"
    }

    async fn connect(&self) -> Result<()> {
        let sender = match self.message_sender.lock().await.take() {
            Some(sender) => sender,
            None => return Err(anyhow::anyhow!("console platform already connected")),
        };

        let username = self.username.clone();
        let is_mod = self.is_mod;
        let next_id = self.next_id.clone();

        let task = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        let message = ConsolePlatform::make_message(&username, is_mod, id, line);
                        if sender.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Console input closed");
                        break;
                    }
                    Err(e) => {
                        log::error!("Failed to read console input: {}", e);
                        break;
                    }
                }
            }
        });

        *self.reader_task.lock().await = Some(task);
        info!("Console platform connected as '{}'", self.username);
        Ok(())
    }

    async fn take_message_receiver(&self) -> Option<mpsc::Receiver<ChatMessage>> {
        self.message_receiver.lock().await.take()
    }

    async fn send_message(&self, channel: &str, text: &str) -> ActionOutcome {
        println!("[#{}] bot: {}", channel, text);
        ActionOutcome::Ok
    }

    async fn delete_message(&self, channel: &str, message_id: &str) -> ActionOutcome {
        println!("[#{}] message {} recalled", channel, message_id);
        ActionOutcome::Ok
    }

    async fn timeout_user(
        &self,
        channel: &str,
        username: &str,
        duration_seconds: u64,
    ) -> ActionOutcome {
        println!("[#{}] {} muted for {}s", channel, username, duration_seconds);
        ActionOutcome::Ok
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(task) = self.reader_task.lock().await.take() {
            task.abort();
        }
        info!("Console platform disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receiver_is_taken_once() {
        let platform = ConsolePlatform::new("tester", true);
        assert!(platform.take_message_receiver().await.is_some());
        assert!(platform.take_message_receiver().await.is_none());
    }

    #[test]
    fn test_message_shape() {
        let message = ConsolePlatform::make_message("tester", false, 7, "hello".to_string());
        assert_eq!(message.platform, "console");
        assert_eq!(message.channel, CONSOLE_CHANNEL);
        assert_eq!(message.message_id, "7");
        assert!(!message.is_mod);
    }

    #[tokio::test]
    async fn test_side_effects_succeed() {
        let platform = ConsolePlatform::new("tester", true);
        assert!(platform.delete_message("console", "1").await.is_ok());
        assert!(platform.timeout_user("console", "someone", 60).await.is_ok());
        assert!(platform.send_message("console", "hi").await.is_ok());
    }
}
