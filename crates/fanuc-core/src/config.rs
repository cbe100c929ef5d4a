//! Shared configuration for the Fanuc client bot.
//!
//! All persistent data lives under one state directory:
//!
//! ```text
//! ~/.fanuc-bot/
//! ├── .env         # Secrets (bot token), loaded before the local .env
//! └── store.json   # Users, Kafka targets, Fanuc services
//! ```
//!
//! # Environment Variables
//!
//! - `FANUC_BOT_STATE_DIR`: Override the state directory
//! - `TELEGRAM_BOT_TOKEN` (or `TG_TOKEN`): Bot token
//! - `FANUC_LIVE_PERIOD_MS`: Live refresh period (default 1500)
//! - `FANUC_LIVE_FETCH_TIMEOUT_MS`: Per-refresh fetch timeout (default 5000)
//! - `FANUC_HTTP_TIMEOUT_MS`: Control-API request timeout (default 10000)

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

/// Environment variable for a custom state directory.
pub const STATE_DIR_ENV: &str = "FANUC_BOT_STATE_DIR";

/// Environment variable holding the Telegram bot token.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Fallback token variable.
pub const TOKEN_ENV_FALLBACK: &str = "TG_TOKEN";

pub const LIVE_PERIOD_ENV: &str = "FANUC_LIVE_PERIOD_MS";
pub const LIVE_FETCH_TIMEOUT_ENV: &str = "FANUC_LIVE_FETCH_TIMEOUT_MS";
pub const HTTP_TIMEOUT_ENV: &str = "FANUC_HTTP_TIMEOUT_MS";

const DEFAULT_STATE_DIR: &str = ".fanuc-bot";
const STORE_FILE: &str = "store.json";
const ENV_FILE: &str = ".env";

const DEFAULT_LIVE_PERIOD_MS: u64 = 1500;
const DEFAULT_LIVE_FETCH_TIMEOUT_MS: u64 = 5000;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

/// Get the state directory.
///
/// Resolution order:
/// 1. `FANUC_BOT_STATE_DIR` if set
/// 2. `~/.fanuc-bot` when a home directory is available
/// 3. `.fanuc-bot` in the current directory
pub fn state_dir() -> PathBuf {
    std::env::var(STATE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(DEFAULT_STATE_DIR))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
        })
}

/// Path of the JSON store inside `dir`.
pub fn store_file_in(dir: &Path) -> PathBuf {
    dir.join(STORE_FILE)
}

/// Path of the `.env` file inside `dir`.
pub fn env_file_in(dir: &Path) -> PathBuf {
    dir.join(ENV_FILE)
}

/// Loads `.env` files: the state-directory one first, then the local one.
///
/// Variables already present in the environment are never overwritten.
pub fn load_env(dir: &Path) {
    let state_env = env_file_in(dir);
    match dotenvy::from_path(&state_env) {
        Ok(()) => debug!(path = %state_env.display(), "Loaded env file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(path = %state_env.display(), error = %e, "Failed to load env file"),
    }
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded local env file");
    }
}

/// Bot token from `TELEGRAM_BOT_TOKEN`, falling back to `TG_TOKEN`.
pub fn telegram_token() -> Option<String> {
    [TOKEN_ENV, TOKEN_ENV_FALLBACK]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn millis_from_env(name: &str, default_ms: u64) -> Duration {
    let ms = match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => ms,
            _ => {
                warn!(var = name, value = %raw, default_ms, "Ignoring invalid duration");
                default_ms
            }
        },
        Err(_) => default_ms,
    };
    Duration::from_millis(ms)
}

/// Timeout applied to every control-API request.
pub fn http_timeout() -> Duration {
    millis_from_env(HTTP_TIMEOUT_ENV, DEFAULT_HTTP_TIMEOUT_MS)
}

/// Timing of live refresh loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveConfig {
    /// Delay between refreshes.
    pub period: Duration,
    /// Upper bound for a single fetch.
    pub fetch_timeout: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(DEFAULT_LIVE_PERIOD_MS),
            fetch_timeout: Duration::from_millis(DEFAULT_LIVE_FETCH_TIMEOUT_MS),
        }
    }
}

impl LiveConfig {
    /// Reads overrides from the environment.
    pub fn from_env() -> Self {
        Self {
            period: millis_from_env(LIVE_PERIOD_ENV, DEFAULT_LIVE_PERIOD_MS),
            fetch_timeout: millis_from_env(LIVE_FETCH_TIMEOUT_ENV, DEFAULT_LIVE_FETCH_TIMEOUT_MS),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}
