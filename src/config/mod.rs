// src/config/mod.rs - Filter configuration loading with YAML/TOML support

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::time::Duration;

use crate::dictionary::{DictionaryOptions, MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use crate::error::{GuardError, Result};

pub const DICTIONARY_PATH_ENV: &str = "NOTAGUARD_DICTIONARY";
pub const IGNORE_CASE_ENV: &str = "NOTAGUARD_IGNORE_CASE";

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub dictionary: DictionarySettings,
    pub moderation: ModerationSettings,
}

/// How dictionary file changes are detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// Filesystem notifications, falling back to polling if unavailable
    Event,
    /// Compare modification time on a fixed interval
    Poll,
}

/// Options consumed by the dictionary engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionarySettings {
    pub path: PathBuf,
    pub treat_lines_as_regex: bool,
    pub ignore_case: bool,
    pub batch_size: usize,
    pub watch_for_changes: bool,
    pub watch_mode: WatchMode,
    pub poll_interval_secs: u64,
    pub debounce_ms: u64,
    pub max_matches: usize,
}

impl Default for DictionarySettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/banned_words.txt"),
            treat_lines_as_regex: false,
            ignore_case: true,
            batch_size: 500,
            watch_for_changes: true,
            watch_mode: WatchMode::Event,
            poll_interval_secs: 5,
            debounce_ms: 300,
            max_matches: 10,
        }
    }
}

impl DictionarySettings {
    /// Batch size clamped into the supported range
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
    }

    pub fn options(&self) -> DictionaryOptions {
        DictionaryOptions {
            treat_lines_as_regex: self.treat_lines_as_regex,
            ignore_case: self.ignore_case,
            batch_size: self.effective_batch_size(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn max_matches(&self) -> usize {
        self.max_matches.max(1)
    }
}

/// What the host does when a message hits the dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    pub reply_on_hit: bool,
    pub reply_template: String,
    pub recall_message: bool,
    /// 0 disables muting
    pub mute_seconds: u64,
    pub exempt_moderators: bool,
    pub command_prefix: String,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            reply_on_hit: true,
            reply_template: "@$(user) your message contains banned content: $(matches)".to_string(),
            recall_message: true,
            mute_seconds: 0,
            exempt_moderators: true,
            command_prefix: "!".to_string(),
        }
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick a format from the file extension; anything but `.toml` is YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

impl GuardConfig {
    /// Load configuration from a file. A missing file yields defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let mut config = match fs::read_to_string(path).await {
            Ok(content) => Self::parse(&content, ConfigFormat::from_path(path))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Configuration file {} not found, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                return Err(GuardError::Config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration, writing a default file first if none exists
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if fs::metadata(path).await.is_err() {
            Self::default().save(path).await?;
            info!("Created default configuration: {}", path.display());
        }
        Self::load(path).await
    }

    /// Parse configuration text in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        };
        Ok(config)
    }

    /// Write configuration in the format implied by the file extension
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| GuardError::Config(format!("failed to encode TOML: {}", e)))?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                GuardError::Config(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        fs::write(path, content)
            .await
            .map_err(|e| GuardError::Config(format!("failed to write {}: {}", path.display(), e)))
    }

    /// Apply `NOTAGUARD_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(DICTIONARY_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            info!("Dictionary path overridden by {}: {}", DICTIONARY_PATH_ENV, path);
            self.dictionary.path = PathBuf::from(path);
        }

        if let Some(value) = lookup(IGNORE_CASE_ENV) {
            match parse_bool(&value) {
                Some(flag) => self.dictionary.ignore_case = flag,
                None => warn!("Ignoring {}={}: expected true or false", IGNORE_CASE_ENV, value),
            }
        }
    }

    /// Report values that will be clamped or look suspicious
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let dictionary = &self.dictionary;

        if dictionary.batch_size != dictionary.effective_batch_size() {
            warnings.push(format!(
                "batch_size {} outside {}..={}, using {}",
                dictionary.batch_size,
                MIN_BATCH_SIZE,
                MAX_BATCH_SIZE,
                dictionary.effective_batch_size()
            ));
        }
        if dictionary.max_matches == 0 {
            warnings.push("max_matches must be at least 1, using 1".to_string());
        }
        if dictionary.poll_interval_secs == 0 {
            warnings.push("poll_interval_secs must be at least 1, using 1".to_string());
        }
        if dictionary.path.as_os_str().is_empty() {
            warnings.push("dictionary path is empty; nothing will be filtered".to_string());
        }
        if self.moderation.command_prefix.is_empty() {
            warnings.push(
                "command_prefix is empty; every message is treated as a command".to_string(),
            );
        }

        warnings
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = GuardConfig::parse(
            "dictionary:\n  path: words.txt\n  batch_size: 10\n",
            ConfigFormat::Yaml,
        )
        .unwrap();

        assert_eq!(config.dictionary.path, PathBuf::from("words.txt"));
        assert!(config.dictionary.ignore_case);
        assert_eq!(config.dictionary.effective_batch_size(), MIN_BATCH_SIZE);
        assert_eq!(config.moderation, ModerationSettings::default());
    }

    #[test]
    fn test_toml_parsing() {
        let config = GuardConfig::parse(
            "[dictionary]\nwatch_mode = \"poll\"\nbatch_size = 100000\nmax_matches = 0\n",
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.dictionary.watch_mode, WatchMode::Poll);
        assert_eq!(config.dictionary.effective_batch_size(), MAX_BATCH_SIZE);
        assert_eq!(config.dictionary.max_matches(), 1);
        assert_eq!(config.validate().len(), 2);
    }

    #[test]
    fn test_options_follow_settings() {
        let settings = DictionarySettings {
            treat_lines_as_regex: true,
            ignore_case: false,
            batch_size: 700,
            ..DictionarySettings::default()
        };
        let options = settings.options();
        assert!(options.treat_lines_as_regex);
        assert!(!options.ignore_case);
        assert_eq!(options.batch_size, 700);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_path(Path::new("guard.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("guard.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("guard")), ConfigFormat::Yaml);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (DICTIONARY_PATH_ENV, "/srv/words.txt"),
            (IGNORE_CASE_ENV, "off"),
        ]
        .into_iter()
        .collect();

        let mut config = GuardConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.dictionary.path, PathBuf::from("/srv/words.txt"));
        assert!(!config.dictionary.ignore_case);

        let mut untouched = GuardConfig::default();
        untouched.apply_overrides(|key| (key == IGNORE_CASE_ENV).then(|| "maybe".to_string()));
        assert!(untouched.dictionary.ignore_case);
    }

    #[tokio::test]
    async fn test_load_or_create_round_trip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("conf").join("notaguard.yaml");

        let created = GuardConfig::load_or_create(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(created.moderation, ModerationSettings::default());

        let toml_path = temp_dir.path().join("notaguard.toml");
        created.save(&toml_path).await.unwrap();
        let reloaded = GuardConfig::load(&toml_path).await.unwrap();
        assert_eq!(reloaded.moderation, created.moderation);
        assert_eq!(reloaded.dictionary.batch_size, created.dictionary.batch_size);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let temp_dir = tempdir().unwrap();
        let config = GuardConfig::load(&temp_dir.path().join("absent.yaml")).await.unwrap();
        assert_eq!(config.moderation, ModerationSettings::default());
    }
}
