// src/bot/moderation.rs - Banned-term moderation on top of the hot-reloadable dictionary

use log::{debug, error, info};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ModerationSettings;
use crate::platforms::{ActionOutcome, ChatPlatform};
use crate::reload::ReloadController;
use crate::types::ChatMessage;

/// Decision for one message that hit the dictionary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationVerdict {
    pub labels: Vec<String>,
    pub total: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ModerationAction {
    DeleteMessage,
    TimeoutUser { duration_seconds: u64 },
    WarnUser { message: String },
}

pub struct ModerationSystem {
    controller: ReloadController,
    settings: ModerationSettings,
    max_matches: usize,
    global_enabled: AtomicBool,
}

impl ModerationSystem {
    pub fn new(
        controller: ReloadController,
        settings: ModerationSettings,
        max_matches: usize,
    ) -> Self {
        Self {
            controller,
            settings,
            max_matches: max_matches.max(1),
            global_enabled: AtomicBool::new(true),
        }
    }

    pub fn controller(&self) -> &ReloadController {
        &self.controller
    }

    pub fn settings(&self) -> &ModerationSettings {
        &self.settings
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.global_enabled.store(enabled, Ordering::SeqCst);
        info!("Banned-term moderation {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.global_enabled.load(Ordering::SeqCst)
    }

    /// Check a message against the active dictionary.
    ///
    /// Both the hit test and the label collection run on the same snapshot,
    /// so a reload in between cannot produce a hit with no labels.
    pub fn check_message(&self, message: &ChatMessage) -> Option<ModerationVerdict> {
        if !self.is_enabled() {
            return None;
        }
        if message.is_mod && self.settings.exempt_moderators {
            return None;
        }

        let snapshot = self.controller.snapshot();
        if !snapshot.hit(&message.content) {
            return None;
        }

        let report = snapshot.matches(&message.content, self.max_matches);
        if report.is_empty() {
            return None;
        }
        Some(ModerationVerdict {
            truncated: report.is_truncated(),
            total: report.total,
            labels: report.labels,
        })
    }

    /// Actions to take for a verdict, in execution order
    pub fn plan_actions(
        &self,
        verdict: &ModerationVerdict,
        message: &ChatMessage,
    ) -> Vec<ModerationAction> {
        let mut actions = Vec::new();

        if self.settings.recall_message {
            actions.push(ModerationAction::DeleteMessage);
        }
        if self.settings.mute_seconds > 0 {
            actions.push(ModerationAction::TimeoutUser {
                duration_seconds: self.settings.mute_seconds,
            });
        }
        if self.settings.reply_on_hit {
            actions.push(ModerationAction::WarnUser {
                message: self.render_reply(verdict, message),
            });
        }

        actions
    }

    /// Carry out the planned actions. Platform failures are logged and the
    /// remaining actions still run.
    pub async fn enforce(
        &self,
        verdict: &ModerationVerdict,
        message: &ChatMessage,
        platform: &dyn ChatPlatform,
    ) -> Vec<(ModerationAction, ActionOutcome)> {
        let mut results = Vec::new();

        for action in self.plan_actions(verdict, message) {
            let outcome = match &action {
                ModerationAction::DeleteMessage => {
                    platform.delete_message(&message.channel, &message.message_id).await
                }
                ModerationAction::TimeoutUser { duration_seconds } => {
                    platform
                        .timeout_user(&message.channel, &message.username, *duration_seconds)
                        .await
                }
                ModerationAction::WarnUser { message: reply } => {
                    platform.send_message(&message.channel, reply).await
                }
            };

            if let ActionOutcome::Failed { reason } = &outcome {
                error!(
                    "{:?} failed for {} on {}#{}: {}",
                    action, message.username, message.platform, message.channel, reason
                );
            }
            results.push((action, outcome));
        }

        results
    }

    /// Check and enforce in one step. Returns the verdict when the message hit.
    pub async fn process_message(
        &self,
        message: &ChatMessage,
        platform: &dyn ChatPlatform,
    ) -> Option<ModerationVerdict> {
        let verdict = self.check_message(message)?;

        info!(
            "Message {} from {} on {}#{} hit {} banned term(s): {}",
            message.message_id,
            message.username,
            message.platform,
            message.channel,
            verdict.total,
            verdict.labels.join(", ")
        );
        if let Ok(json) = serde_json::to_string(&verdict) {
            debug!("Verdict: {}", json);
        }

        self.enforce(&verdict, message, platform).await;
        Some(verdict)
    }

    /// Fill the reply template's `$(user)`, `$(channel)`, `$(matches)` and
    /// `$(count)` variables
    pub fn render_reply(&self, verdict: &ModerationVerdict, message: &ChatMessage) -> String {
        let mut matches = verdict.labels.join(", ");
        if verdict.truncated {
            matches.push_str(&format!(" (+{} more)", verdict.total - verdict.labels.len()));
        }

        self.settings
            .reply_template
            .replace("$(user)", &message.username)
            .replace("$(channel)", &message.channel)
            .replace("$(matches)", &matches)
            .replace("$(count)", &verdict.total.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DictionaryOptions;
    use async_trait::async_trait;
    use tokio::sync::{mpsc, Mutex};

    #[derive(Default)]
    struct RecordingPlatform {
        calls: Mutex<Vec<String>>,
        fail_deletes: bool,
    }

    #[async_trait]
    impl ChatPlatform for RecordingPlatform {
        fn platform_name(&self) -> &str {
            "recording"
        }

        async fn connect(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn take_message_receiver(&self) -> Option<mpsc::Receiver<ChatMessage>> {
            None
        }

        async fn send_message(&self, channel: &str, text: &str) -> ActionOutcome {
            self.calls.lock().await.push(format!("send {} {}", channel, text));
            ActionOutcome::Ok
        }

        async fn delete_message(&self, _channel: &str, message_id: &str) -> ActionOutcome {
            self.calls.lock().await.push(format!("delete {}", message_id));
            if self.fail_deletes {
                ActionOutcome::failed("missing permission")
            } else {
                ActionOutcome::Ok
            }
        }

        async fn timeout_user(
            &self,
            _channel: &str,
            username: &str,
            duration_seconds: u64,
        ) -> ActionOutcome {
            self.calls.lock().await.push(format!("timeout {} {}", username, duration_seconds));
            ActionOutcome::Ok
        }

        async fn disconnect(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn message(content: &str, is_mod: bool) -> ChatMessage {
        ChatMessage {
            platform: "test".to_string(),
            channel: "lobby".to_string(),
            message_id: "42".to_string(),
            username: "viewer".to_string(),
            content: content.to_string(),
            timestamp: chrono::Utc::now(),
            is_mod,
        }
    }

    async fn system_with(
        words: &str,
        settings: ModerationSettings,
        max_matches: usize,
    ) -> (ModerationSystem, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, words).unwrap();
        let controller = ReloadController::new(&path, DictionaryOptions::default());
        controller.initialize().await;
        (ModerationSystem::new(controller, settings, max_matches), dir)
    }

    #[tokio::test]
    async fn test_clean_message_passes() {
        let (system, _dir) = system_with("spam\n", ModerationSettings::default(), 10).await;
        assert!(system.check_message(&message("hello there", false)).is_none());
    }

    #[tokio::test]
    async fn test_hit_produces_verdict() {
        let settings = ModerationSettings::default();
        let (system, _dir) = system_with("spam\n/fu+ck/\n", settings, 10).await;
        let verdict = system.check_message(&message("SPAM and fuuuck", false)).unwrap();
        assert_eq!(verdict.total, 2);
        assert_eq!(verdict.labels, vec!["spam".to_string(), "/fu+ck/i".to_string()]);
        assert!(!verdict.truncated);
    }

    #[tokio::test]
    async fn test_non_ascii_terms_produce_labelled_verdicts() {
        let settings = ModerationSettings::default();
        let (system, _dir) = system_with("İstanbul\nſpam\n", settings, 10).await;

        let verdict = system.check_message(&message("tickets to İSTANBUL", false)).unwrap();
        assert_eq!(verdict.total, 1);
        assert_eq!(verdict.labels, vec!["i\u{307}stanbul".to_string()]);

        assert!(system.check_message(&message("buy spam", false)).is_none());
    }

    #[tokio::test]
    async fn test_moderators_exempt_unless_configured() {
        let (system, _dir) = system_with("spam\n", ModerationSettings::default(), 10).await;
        assert!(system.check_message(&message("spam", true)).is_none());

        let settings = ModerationSettings {
            exempt_moderators: false,
            ..ModerationSettings::default()
        };
        let (system, _dir) = system_with("spam\n", settings, 10).await;
        assert!(system.check_message(&message("spam", true)).is_some());
    }

    #[tokio::test]
    async fn test_disabled_system_ignores_hits() {
        let (system, _dir) = system_with("spam\n", ModerationSettings::default(), 10).await;
        system.set_enabled(false);
        assert!(system.check_message(&message("spam", false)).is_none());
        system.set_enabled(true);
        assert!(system.check_message(&message("spam", false)).is_some());
    }

    #[tokio::test]
    async fn test_reply_reports_truncation() {
        let settings = ModerationSettings {
            reply_template: "$(user) in $(channel): $(matches) [$(count)]".to_string(),
            ..ModerationSettings::default()
        };
        let (system, _dir) = system_with("aa\nbb\ncc\n", settings, 2).await;
        let msg = message("aa bb cc", false);
        let verdict = system.check_message(&msg).unwrap();
        assert!(verdict.truncated);
        assert_eq!(system.render_reply(&verdict, &msg), "viewer in lobby: aa, bb (+1 more) [3]");
    }

    #[tokio::test]
    async fn test_enforce_runs_actions_in_order() {
        let settings = ModerationSettings {
            mute_seconds: 60,
            ..ModerationSettings::default()
        };
        let (system, _dir) = system_with("spam\n", settings, 10).await;
        let platform = RecordingPlatform::default();

        let verdict = system.process_message(&message("spam", false), &platform).await;
        assert!(verdict.is_some());

        let calls = platform.calls.lock().await;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], "delete 42");
        assert_eq!(calls[1], "timeout viewer 60");
        assert!(calls[2].starts_with("send lobby @viewer"));
    }

    #[tokio::test]
    async fn test_platform_failure_does_not_stop_enforcement() {
        let (system, _dir) = system_with("spam\n", ModerationSettings::default(), 10).await;
        let platform = RecordingPlatform {
            fail_deletes: true,
            ..RecordingPlatform::default()
        };

        let msg = message("spam", false);
        let verdict = system.check_message(&msg).unwrap();
        let results = system.enforce(&verdict, &msg, &platform).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1, ActionOutcome::failed("missing permission"));
        assert!(results[1].1.is_ok());
    }

    #[tokio::test]
    async fn test_no_actions_when_all_disabled() {
        let settings = ModerationSettings {
            reply_on_hit: false,
            recall_message: false,
            mute_seconds: 0,
            ..ModerationSettings::default()
        };
        let (system, _dir) = system_with("spam\n", settings, 10).await;
        let msg = message("spam", false);
        let verdict = system.check_message(&msg).unwrap();
        assert!(system.plan_actions(&verdict, &msg).is_empty());
    }
}
