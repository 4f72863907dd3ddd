// src/types/mod.rs - Core term, outcome and message types

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Core message type handed to the moderation layer by a platform adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub platform: String,
    pub channel: String,
    pub message_id: String,
    pub username: String,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub is_mod: bool,
}

/// One banned-content rule, classified once at parse time
#[derive(Debug, Clone)]
pub enum Term {
    Plain(PlainTerm),
    Regex(RegexTerm),
}

impl Term {
    /// Human-readable label used in match reports
    pub fn label(&self) -> String {
        match self {
            Term::Plain(plain) => plain.text.clone(),
            Term::Regex(regex) => regex.label(),
        }
    }
}

/// Literal substring term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainTerm {
    pub text: String,
    pub case_folded: bool,
}

impl PlainTerm {
    pub fn new(text: impl Into<String>, case_folded: bool) -> Self {
        Self {
            text: text.into(),
            case_folded,
        }
    }
}

/// Regular expression term together with its compiled form
#[derive(Debug, Clone)]
pub struct RegexTerm {
    pub source: String,
    pub flags: RegexFlags,
    pub compiled: Regex,
}

impl RegexTerm {
    /// `/source/flags` form shown to moderators
    pub fn label(&self) -> String {
        format!("/{}/{}", self.source, self.flags)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }
}

/// Regex flag set accepted in `/body/flags` dictionary lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RegexFlags {
    pub ignore_case: bool,
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
    pub ignore_whitespace: bool,
}

impl RegexFlags {
    /// Flag set used when a line carries no flags of its own
    pub fn default_for(ignore_case: bool) -> Self {
        Self {
            ignore_case,
            ..Self::default()
        }
    }

    /// Parse flag letters. `g`, `u` and `y` are accepted and ignored since
    /// they carry no meaning for an existence test.
    pub fn parse(letters: &str) -> Result<Self, String> {
        let mut flags = Self::default();

        for flag in letters.chars() {
            match flag {
                'i' => flags.ignore_case = true,
                'm' => flags.multi_line = true,
                's' => flags.dot_matches_new_line = true,
                'x' => flags.ignore_whitespace = true,
                'g' | 'u' | 'y' => {}
                other => return Err(format!("unknown regex flag '{}'", other)),
            }
        }

        Ok(flags)
    }

    /// Apply this flag set to a regex builder
    pub fn apply(&self, builder: &mut RegexBuilder) {
        builder
            .case_insensitive(self.ignore_case)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_matches_new_line)
            .ignore_whitespace(self.ignore_whitespace);
    }
}

impl fmt::Display for RegexFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut letters = String::new();
        if self.ignore_case {
            letters.push('i');
        }
        if self.multi_line {
            letters.push('m');
        }
        if self.dot_matches_new_line {
            letters.push('s');
        }
        if self.ignore_whitespace {
            letters.push('x');
        }
        f.write_str(&letters)
    }
}

/// Classification of a single raw dictionary line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermOutcome {
    /// Blank line or full-line comment
    Skip,
    /// Literal term, already case-folded when configured
    Plain(String),
    /// Regex body plus its flags, not yet compiled
    Regex { source: String, flags: RegexFlags },
    /// Line rejected; dropped from the load with a warning
    Invalid { reason: String },
}

/// Non-fatal problem found while building a dictionary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    /// Dictionary file could not be read; an empty dictionary was used
    SourceUnavailable { path: PathBuf, reason: String },
    /// Dictionary file is not valid UTF-8; an empty dictionary was used
    Undecodable { path: PathBuf, reason: String },
    /// Startup load failed for another reason; an empty dictionary was used
    LoadFailed { path: PathBuf, reason: String },
    /// One dictionary line was dropped
    InvalidLine {
        line: usize,
        text: String,
        reason: String,
    },
    /// A literal batch could not be compiled even after splitting
    BatchRejected { term: String, reason: String },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::SourceUnavailable { path, reason } => {
                write!(f, "dictionary {} unavailable: {}", path.display(), reason)
            }
            LoadWarning::Undecodable { path, reason } => {
                write!(f, "dictionary {} could not be decoded: {}", path.display(), reason)
            }
            LoadWarning::LoadFailed { path, reason } => {
                write!(f, "dictionary {} failed to load: {}", path.display(), reason)
            }
            LoadWarning::InvalidLine { line, text, reason } => {
                write!(f, "line {} '{}' dropped: {}", line, text, reason)
            }
            LoadWarning::BatchRejected { term, reason } => {
                write!(f, "literal term '{}' could not be batched: {}", term, reason)
            }
        }
    }
}

/// Summary of one dictionary (re)load, handed to the host for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadOutcome {
    pub term_count: usize,
    pub batch_count: usize,
    pub regex_count: usize,
    pub warnings: Vec<LoadWarning>,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
    pub elapsed_ms: u64,
}

/// Result of an exhaustive match collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    /// At most `cap` labels, plain terms first then regex terms
    pub labels: Vec<String>,
    /// Untruncated number of matching terms
    pub total: usize,
}

impl MatchReport {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// True when more terms matched than were returned
    pub fn is_truncated(&self) -> bool {
        self.total > self.labels.len()
    }
}
