use anyhow::Result;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::bot::moderation::ModerationSystem;
use crate::bot::ReloadStats;
use crate::types::{ChatMessage, ReloadOutcome};

/// Moderator commands for inspecting and reloading the banned-term dictionary
pub struct FilterCommands {
    moderation_system: Arc<ModerationSystem>,
    reload_stats: Arc<RwLock<ReloadStats>>,
}

impl FilterCommands {
    pub fn new(
        moderation_system: Arc<ModerationSystem>,
        reload_stats: Arc<RwLock<ReloadStats>>,
    ) -> Self {
        Self {
            moderation_system,
            reload_stats,
        }
    }

    /// Process filter-related commands (!reloadwords, !wordstats, !checkword, !filter).
    ///
    /// Returns the reply to send, or `None` when the command is not ours.
    pub async fn process_command(
        &self,
        command: &str,
        args: &[&str],
        message: &ChatMessage,
    ) -> Result<Option<String>> {
        // Only moderators can manage filters
        if !message.is_mod {
            return Ok(None);
        }

        let response = match command {
            "reloadwords" => self.handle_reload_command(message).await,
            "wordstats" => self.handle_stats_command().await,
            "checkword" => self.handle_check_command(args),
            "filter" => self.handle_toggle_command(args),
            _ => return Ok(None),
        };

        Ok(Some(response))
    }

    async fn handle_reload_command(&self, message: &ChatMessage) -> String {
        info!("Dictionary reload requested by {} on {}", message.username, message.platform);

        match self.moderation_system.controller().reload().await {
            Ok(outcome) => format!("✅ {}", format_outcome(&outcome)),
            Err(e) => {
                warn!("Manual dictionary reload failed: {}", e);
                format!("❌ Reload failed, keeping the previous word list: {}", e)
            }
        }
    }

    async fn handle_stats_command(&self) -> String {
        let snapshot = self.moderation_system.controller().snapshot();
        let stats = self.reload_stats.read().await;

        let warnings = stats
            .last_outcome
            .as_ref()
            .map(|outcome| outcome.warnings.len())
            .unwrap_or(0);

        format!(
            "📊 Word filter: {} terms in {} batches, {} regex terms | loaded {} | {} reloads \
             | {} warnings | {}",
            snapshot.term_count(),
            snapshot.batch_count(),
            snapshot.regex_count(),
            snapshot.loaded_at().format("%Y-%m-%d %H:%M:%S UTC"),
            stats.reload_count,
            warnings,
            if self.moderation_system.is_enabled() { "enabled" } else { "disabled" }
        )
    }

    fn handle_check_command(&self, args: &[&str]) -> String {
        if args.is_empty() {
            return "Usage: !checkword <text>".to_string();
        }

        let text = args.join(" ");
        let snapshot = self.moderation_system.controller().snapshot();
        if !snapshot.hit(&text) {
            return "✅ No banned terms found".to_string();
        }

        let report = snapshot.matches(&text, 10);
        let mut response = format!(
            "🚫 {} banned term(s): {}",
            report.total,
            report.labels.join(", ")
        );
        if report.is_truncated() {
            response.push_str(&format!(" (+{} more)", report.total - report.labels.len()));
        }
        response
    }

    fn handle_toggle_command(&self, args: &[&str]) -> String {
        match args.first().map(|arg| arg.to_lowercase()).as_deref() {
            Some("on") | Some("enable") => {
                self.moderation_system.set_enabled(true);
                "✅ Word filter enabled".to_string()
            }
            Some("off") | Some("disable") => {
                self.moderation_system.set_enabled(false);
                "⏸️ Word filter disabled".to_string()
            }
            _ => "Usage: !filter <on|off>".to_string(),
        }
    }

    /// Snapshot of filter statistics for logging
    pub async fn get_filter_stats(&self) -> HashMap<String, serde_json::Value> {
        let snapshot = self.moderation_system.controller().snapshot();
        let stats = self.reload_stats.read().await;

        let mut result = HashMap::new();
        result.insert("term_count".to_string(), serde_json::json!(snapshot.term_count()));
        result.insert("batch_count".to_string(), serde_json::json!(snapshot.batch_count()));
        result.insert("regex_count".to_string(), serde_json::json!(snapshot.regex_count()));
        result.insert("reload_count".to_string(), serde_json::json!(stats.reload_count));
        result.insert(
            "enabled".to_string(),
            serde_json::json!(self.moderation_system.is_enabled()),
        );
        if let Some(outcome) = &stats.last_outcome {
            result.insert("last_reload".to_string(), serde_json::json!(outcome));
        }
        result
    }
}

/// One-line summary of a reload
pub fn format_outcome(outcome: &ReloadOutcome) -> String {
    let mut summary = format!(
        "Loaded {} terms in {} batches and {} regex terms in {} ms",
        outcome.term_count, outcome.batch_count, outcome.regex_count, outcome.elapsed_ms
    );
    if !outcome.warnings.is_empty() {
        summary.push_str(&format!(
            ", {} line(s) skipped: {}",
            outcome.warnings.len(),
            outcome.warnings[0]
        ));
        if outcome.warnings.len() > 1 {
            summary.push_str(" ...");
        }
    }
    summary
}
