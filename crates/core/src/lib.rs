pub mod domain;
pub mod error;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::storage::StorageOptions;

    const DEFAULT_STOCKS_FILE: &str = "stocks.json";
    const DEFAULT_TRADING_CONFIGS_FILE: &str = "trading_configs.json";
    const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 5_000;
    const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub stocks_file: PathBuf,
        pub trading_configs_file: PathBuf,
        pub seed_on_empty: bool,
        pub flush_timeout: Duration,
        pub cors_allowed_origins: Vec<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Builds settings from an arbitrary key lookup so tests don't have to touch the process env.
        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

            let flush_timeout_ms = match var("STORAGE_FLUSH_TIMEOUT_MS") {
                Some(v) => v
                    .parse::<u64>()
                    .with_context(|| format!("STORAGE_FLUSH_TIMEOUT_MS must be an integer (got {v})"))?,
                None => DEFAULT_FLUSH_TIMEOUT_MS,
            };
            anyhow::ensure!(flush_timeout_ms >= 1, "STORAGE_FLUSH_TIMEOUT_MS must be >= 1");

            let seed_on_empty = match var("STOCKS_SEED_ON_EMPTY") {
                Some(v) => parse_bool(&v)
                    .with_context(|| format!("STOCKS_SEED_ON_EMPTY must be a boolean (got {v})"))?,
                None => false,
            };

            let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();

            Ok(Self {
                stocks_file: var("STOCKS_FILE")
                    .unwrap_or_else(|| DEFAULT_STOCKS_FILE.to_string())
                    .into(),
                trading_configs_file: var("TRADING_CONFIGS_FILE")
                    .unwrap_or_else(|| DEFAULT_TRADING_CONFIGS_FILE.to_string())
                    .into(),
                seed_on_empty,
                flush_timeout: Duration::from_millis(flush_timeout_ms),
                cors_allowed_origins,
                sentry_dsn: var("SENTRY_DSN"),
            })
        }

        pub fn storage_options(&self) -> StorageOptions {
            StorageOptions {
                flush_timeout: self.flush_timeout,
                seed_on_empty: self.seed_on_empty,
            }
        }
    }

    fn parse_bool(s: &str) -> Option<bool> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

}
