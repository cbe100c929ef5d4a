//! Fanuc client Telegram bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx cargo run -p fanuc-telegram
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use fanuc_adapters::{FanucHttpClient, KafkaReader};
use fanuc_core::{config, Backends, Dispatcher, LiveConfig};
use fanuc_persistence::JsonStore;
use fanuc_telegram::TelegramBot;
use tracing_subscriber::EnvFilter;

/// Fanuc client bot - Kafka telemetry and machine control from Telegram
#[derive(Parser, Debug)]
#[command(name = "fanuc-telegram")]
#[command(about = "Telegram bot for reading Kafka telemetry and managing Fanuc machine connections")]
struct Args {
    /// State directory holding store.json and .env
    #[arg(long, env = config::STATE_DIR_ENV)]
    state_dir: Option<PathBuf>,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "fanuc_telegram=info,fanuc_core=info,teloxide=warn",
        1 => "fanuc_telegram=debug,fanuc_core=debug,teloxide=info",
        2 => "fanuc_telegram=trace,fanuc_core=trace,fanuc_adapters=debug,teloxide=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let state_dir = args.state_dir.unwrap_or_else(config::state_dir);
    config::load_env(&state_dir);

    let store_path = config::store_file_in(&state_dir);
    let store = Arc::new(JsonStore::open(&store_path)?);
    tracing::info!(path = %store_path.display(), "Store opened");

    let backends = Backends {
        state: store.clone(),
        targets: store.clone(),
        services: store,
        kafka: Arc::new(KafkaReader::new()),
        machines: Arc::new(FanucHttpClient::new(config::http_timeout())?),
    };
    let dispatcher = Arc::new(Dispatcher::new(backends, LiveConfig::from_env()));

    let bot = TelegramBot::from_env(dispatcher)?;
    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\nFanuc Client Bot");
            println!("   Bot: @{}", username);
            println!("   State: {}", state_dir.display());
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\nOpen Telegram and send /start to begin");
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;
    Ok(())
}
