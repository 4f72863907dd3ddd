//! # Hot-Reloadable Banned-Term Filter
//!
//! A content moderation engine that loads a banned-term dictionary from a
//! text file, compiles it into fast matchers and swaps in new versions
//! atomically while the file is edited.
//!
//! ## Features
//!
//! - **Plain and Regex Terms**: One term per line, `/body/flags` for regular expressions
//! - **Literal Batching**: Plain terms grouped into a few large alternation patterns
//! - **Hit Test and Match Collection**: Short-circuit existence check or capped label list
//! - **Atomic Hot Reload**: Readers always see one complete dictionary snapshot
//! - **Chat Moderation**: Recall, mute and reply on hits, with moderator commands
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notaguard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = DictionaryOptions::default();
//!     let controller = ReloadController::new("config/banned_words.txt", options);
//!     let outcome = controller.initialize().await;
//!     println!("{} terms loaded", outcome.term_count);
//!
//!     controller
//!         .start_watching(WatchMode::Event, Duration::from_secs(5), Duration::from_millis(300))
//!         .await?;
//!
//!     if controller.hit("some chat message") {
//!         let report = controller.matches("some chat message", 10);
//!         println!("matched: {:?}", report.labels);
//!     }
//!
//!     controller.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod platforms;
pub mod reload;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::{GuardBot, MessageDisposition};
    pub use crate::config::{GuardConfig, WatchMode};
    pub use crate::dictionary::{Dictionary, DictionaryOptions};
    pub use crate::error::{GuardError, Result};
    pub use crate::platforms::{console::ConsolePlatform, ActionOutcome, ChatPlatform};
    pub use crate::reload::{ReloadController, ReloadEvent};
    pub use crate::types::{ChatMessage, LoadWarning, MatchReport, ReloadOutcome, Term};
    pub use std::time::Duration;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
