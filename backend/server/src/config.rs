use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use anyhow::{Result, anyhow};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreKind::Redis),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store {other:?}, expected redis or memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreKind,
    pub redis_url: String,
    pub key_prefix: String,
    pub default_hours: u32,
    pub page_limit: usize,
    pub max_page_limit: usize,
    pub rate_limit: u32,
    pub rate_limit_window: Duration,
    pub rate_limit_sweep: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config = Self {
            port: try_load("RUST_PORT", "3000")?,
            store: try_load("SCHEDULER_STORE", "redis")?,
            redis_url: var("REDIS_URL")
                .or_else(|_| read_secret("REDIS_URL"))
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            key_prefix: try_load("REDIS_KEY_PREFIX", "scheduler")?,
            default_hours: try_load("DEFAULT_HOURS", "10")?,
            page_limit: try_load("PAGE_LIMIT", "20")?,
            max_page_limit: try_load("MAX_PAGE_LIMIT", "100")?,
            rate_limit: try_load("RATE_LIMIT", "100")?,
            rate_limit_window: Duration::from_secs(try_load("RATE_LIMIT_WINDOW_SECS", "900")?),
            rate_limit_sweep: Duration::from_secs(try_load("RATE_LIMIT_SWEEP_SECS", "60")?),
        };

        if config.page_limit > config.max_page_limit {
            return Err(anyhow!(
                "PAGE_LIMIT ({}) exceeds MAX_PAGE_LIMIT ({})",
                config.page_limit,
                config.max_page_limit
            ));
        }

        if config.rate_limit_sweep.is_zero() {
            return Err(anyhow!("RATE_LIMIT_SWEEP_SECS must be positive"));
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            store: StoreKind::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "scheduler".to_string(),
            default_hours: 10,
            page_limit: 20,
            max_page_limit: 100,
            rate_limit: 100,
            rate_limit_window: Duration::from_secs(15 * 60),
            rate_limit_sweep: Duration::from_secs(60),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value: {e}"))
}

fn read_secret(secret_name: &str) -> Result<String, ()> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
}
