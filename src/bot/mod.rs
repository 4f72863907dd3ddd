use anyhow::Result;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::GuardConfig;
use crate::platforms::{ActionOutcome, ChatPlatform};
use crate::reload::{ReloadController, ReloadEvent};
use crate::types::{ChatMessage, ReloadOutcome};

pub mod filter_commands;
pub mod moderation;

use filter_commands::{format_outcome, FilterCommands};
use moderation::{ModerationSystem, ModerationVerdict};

/// Running totals of dictionary reloads seen by the bot
#[derive(Debug, Clone, Default)]
pub struct ReloadStats {
    pub reload_count: u64,
    pub failed_count: u64,
    pub last_outcome: Option<ReloadOutcome>,
    pub last_error: Option<String>,
}

/// What the bot did with one incoming message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageDisposition {
    /// A filter command was handled and answered
    Command(String),
    /// The message hit the dictionary and was moderated
    Moderated(ModerationVerdict),
    Clean,
}

/// Chat bot engine wiring the dictionary, moderation and filter commands together
pub struct GuardBot {
    config: GuardConfig,
    controller: ReloadController,
    moderation_system: Arc<ModerationSystem>,
    filter_commands: Arc<FilterCommands>,
    reload_stats: Arc<RwLock<ReloadStats>>,
}

impl GuardBot {
    pub fn new(config: GuardConfig) -> Self {
        let controller = ReloadController::from_settings(&config.dictionary);
        let moderation_system = Arc::new(ModerationSystem::new(
            controller.clone(),
            config.moderation.clone(),
            config.dictionary.max_matches(),
        ));
        let reload_stats = Arc::new(RwLock::new(ReloadStats::default()));
        let filter_commands = Arc::new(FilterCommands::new(
            Arc::clone(&moderation_system),
            Arc::clone(&reload_stats),
        ));

        Self {
            config,
            controller,
            moderation_system,
            filter_commands,
            reload_stats,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn controller(&self) -> &ReloadController {
        &self.controller
    }

    pub fn moderation_system(&self) -> &Arc<ModerationSystem> {
        &self.moderation_system
    }

    pub async fn reload_stats(&self) -> ReloadStats {
        self.reload_stats.read().await.clone()
    }

    /// Load the dictionary and start watching it for changes
    pub async fn start(&self) -> Result<()> {
        info!("Starting word filter bot...");

        for problem in self.config.validate() {
            warn!("Configuration: {}", problem);
        }

        // Subscribe before the first load so it is counted
        self.spawn_reload_listener(self.controller.subscribe());

        let outcome = self.controller.initialize().await;
        info!("{}", format_outcome(&outcome));
        for warning in &outcome.warnings {
            warn!("Dictionary: {}", warning);
        }

        match self.controller.watch_with_settings(&self.config.dictionary).await {
            Ok(Some(mode)) => info!("Watching dictionary for changes ({:?} mode)", mode),
            Ok(None) => {}
            Err(e) => error!("Failed to start dictionary watcher: {}", e),
        }

        info!("Word filter bot started");
        Ok(())
    }

    fn spawn_reload_listener(&self, mut events: broadcast::Receiver<ReloadEvent>) {
        let reload_stats = Arc::clone(&self.reload_stats);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ReloadEvent::Reloaded(outcome)) => {
                        for warning in &outcome.warnings {
                            warn!("Dictionary: {}", warning);
                        }
                        let mut stats = reload_stats.write().await;
                        stats.reload_count += 1;
                        stats.last_outcome = Some(outcome);
                    }
                    Ok(ReloadEvent::Failed { error }) => {
                        warn!(
                            "Dictionary reload failed, previous word list stays active: {}",
                            error
                        );
                        let mut stats = reload_stats.write().await;
                        stats.failed_count += 1;
                        stats.last_error = Some(error);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Reload listener lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Handle one message: filter commands first, then moderation
    pub async fn handle_message(
        &self,
        message: &ChatMessage,
        platform: &dyn ChatPlatform,
    ) -> MessageDisposition {
        let prefix = &self.config.moderation.command_prefix;

        if let Some(command_line) = message.content.strip_prefix(prefix.as_str()) {
            let mut parts = command_line.split_whitespace();
            if let Some(command) = parts.next() {
                let args: Vec<&str> = parts.collect();
                let command = command.to_lowercase();

                match self.filter_commands.process_command(&command, &args, message).await {
                    Ok(Some(response)) => {
                        let outcome = platform.send_message(&message.channel, &response).await;
                        if let ActionOutcome::Failed { reason } = outcome {
                            error!(
                                "Failed to send response to {}#{}: {}",
                                message.platform, message.channel, reason
                            );
                        }
                        return MessageDisposition::Command(response);
                    }
                    Ok(None) => {}
                    Err(e) => error!("Error processing filter command '{}': {}", command, e),
                }
            }
        }

        match self.moderation_system.process_message(message, platform).await {
            Some(verdict) => MessageDisposition::Moderated(verdict),
            None => MessageDisposition::Clean,
        }
    }

    /// Connect the platform and process messages until input ends or Ctrl+C
    pub async fn run(self: Arc<Self>, platform: Arc<dyn ChatPlatform>) -> Result<()> {
        platform.connect().await?;

        let mut receiver = match platform.take_message_receiver().await {
            Some(receiver) => receiver,
            None => {
                return Err(anyhow::anyhow!(
                    "{} has no message receiver",
                    platform.platform_name()
                ))
            }
        };
        info!("Set up message receiver for {}", platform.platform_name());

        loop {
            tokio::select! {
                message = receiver.recv() => {
                    let Some(message) = message else {
                        info!("{} message stream ended", platform.platform_name());
                        break;
                    };

                    let bot = Arc::clone(&self);
                    let platform = Arc::clone(&platform);
                    tokio::spawn(async move {
                        bot.handle_message(&message, platform.as_ref()).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, stopping...");
                    break;
                }
            }
        }

        if let Err(e) = platform.disconnect().await {
            error!("Failed to disconnect from {}: {}", platform.platform_name(), e);
        }
        Ok(())
    }

    /// Stop watching the dictionary. Match calls keep using the last snapshot.
    pub async fn shutdown(&self) {
        info!("Shutting down word filter bot...");
        self.controller.shutdown().await;

        let stats = self.filter_commands.get_filter_stats().await;
        match serde_json::to_string(&stats) {
            Ok(json) => info!("Final filter stats: {}", json),
            Err(e) => warn!("Could not serialize filter stats: {}", e),
        }
    }
}
