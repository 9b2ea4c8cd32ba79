use anyhow::Context;
use std::collections::HashMap;
use std::str::FromStr;
use std::{net::SocketAddr, time::Duration};

use pricewatch_core::config::DEFAULT_JOB_CONCURRENCY;
use pricewatch_core::PriceSyncConfig;
use pricewatch_price_source::PriceSourceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub staging_dir: String,
    pub snapshot_dir: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub job_concurrency: usize,
    pub log_format: LogFormat,
    pub price_sync: PriceSyncConfig,
    pub price_source: PriceSourceConfig,
}

/// Reads `PW_*` variables through a lookup function.
struct Vars<F: Fn(&str) -> Option<String>>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn string(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match (self.0)(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: '{}'", key, raw)),
            None => Ok(default),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let vars = Vars(lookup);

        let listen_addr: SocketAddr = vars.parse("PW_LISTEN_ADDR", ([0, 0, 0, 0], 8080).into())?;
        let db_path = vars.string("PW_DB_PATH", "./data/pricewatch.db");
        let staging_dir = vars.string("PW_STAGING_DIR", "./data/staging");
        let snapshot_dir = vars.string("PW_SNAPSHOT_DIR", "./data/snapshots");
        let cors_allow = vars
            .string("PW_CORS_ALLOW_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = vars.parse("PW_REQUEST_TIMEOUT_MS", 30_000)?;
        let job_concurrency = vars.parse("PW_JOB_CONCURRENCY", DEFAULT_JOB_CONCURRENCY)?;
        let log_format = match vars.string("PW_LOG_FORMAT", "text").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => anyhow::bail!("Invalid PW_LOG_FORMAT: '{}' (expected text or json)", other),
        };

        let defaults = PriceSyncConfig::default();
        let price_sync = PriceSyncConfig {
            batch_size: vars.parse("PW_SYNC_BATCH_SIZE", defaults.batch_size)?,
            batch_delay: Duration::from_millis(vars.parse(
                "PW_SYNC_BATCH_DELAY_MS",
                defaults.batch_delay.as_millis() as u64,
            )?),
            import_workers: vars.parse("PW_IMPORT_WORKERS", defaults.import_workers)?,
            import_page_size: vars.parse("PW_IMPORT_PAGE_SIZE", defaults.import_page_size)?,
            progress_interval: vars
                .parse("PW_IMPORT_PROGRESS_INTERVAL", defaults.progress_interval)?,
            check_existing: vars.parse("PW_IMPORT_CHECK_EXISTING", defaults.check_existing)?,
            staging_retention_days: vars
                .parse("PW_STAGING_RETENTION_DAYS", defaults.staging_retention_days)?,
            snapshot_retention_days: vars
                .parse("PW_SNAPSHOT_RETENTION_DAYS", defaults.snapshot_retention_days)?,
            snapshot_prefix: vars.string("PW_SNAPSHOT_PREFIX", &defaults.snapshot_prefix),
        };
        price_sync
            .validate()
            .context("Invalid price sync configuration")?;

        let source_defaults = PriceSourceConfig::default();
        let price_source = PriceSourceConfig {
            base_url: vars.string("PW_SOURCE_URL", &source_defaults.base_url),
            locale: vars.string("PW_SOURCE_LOCALE", &source_defaults.locale),
            radius_km: vars.parse("PW_SOURCE_RADIUS_KM", source_defaults.radius_km)?,
            period_days: vars.parse("PW_SOURCE_PERIOD_DAYS", source_defaults.period_days)?,
            request_timeout: Duration::from_millis(vars.parse(
                "PW_SOURCE_TIMEOUT_MS",
                source_defaults.request_timeout.as_millis() as u64,
            )?),
        };

        Ok(Self {
            listen_addr,
            db_path,
            staging_dir,
            snapshot_dir,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            job_concurrency,
            log_format,
            price_sync,
            price_source,
        })
    }
}
