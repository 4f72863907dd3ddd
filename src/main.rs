use anyhow::Result;
use log::{error, info};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use notaguard::prelude::*;

const CONFIG_PATH_ENV: &str = "NOTAGUARD_CONFIG";
const CONSOLE_MOD_ENV: &str = "NOTAGUARD_CONSOLE_MOD";
const DEFAULT_CONFIG_PATH: &str = "config/notaguard.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting NotaGuard v{} - banned-term filter", notaguard::VERSION);

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_PATH_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = match GuardConfig::load_or_create(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration from {}: {}", config_path.display(), e);
            return Err(e.into());
        }
    };
    info!(
        "Using dictionary {} (ignore case: {}, batch size: {})",
        config.dictionary.path.display(),
        config.dictionary.ignore_case,
        config.dictionary.effective_batch_size()
    );

    let bot = Arc::new(GuardBot::new(config));
    bot.start().await?;

    let username = env::var("USER").unwrap_or_else(|_| "console".to_string());
    // Moderator sessions can use filter commands but are exempt from moderation by default
    let is_mod = env::var(CONSOLE_MOD_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let platform: Arc<dyn ChatPlatform> = Arc::new(ConsolePlatform::new(username, is_mod));

    info!("Type chat messages, one per line. Ctrl+C or EOF to stop.");
    if let Err(e) = Arc::clone(&bot).run(platform).await {
        error!("Message loop stopped with error: {}", e);
    }

    bot.shutdown().await;
    info!("NotaGuard stopped");
    Ok(())
}
