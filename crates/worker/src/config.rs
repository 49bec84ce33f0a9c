use std::str::FromStr;
use std::time::Duration;

use viewline_core::baseline::BaselineStrategy;
use viewline_core::shorts::{ShortPolicy, DEFAULT_SHORT_MAX_DURATION_SECS};
use viewline_db::DEFAULT_MAX_CONNECTIONS;

use crate::error::{WorkerError, WorkerResult};

/// Upper bound on channels per batch.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(WorkerError::Config(format!(
                "LOG_FORMAT must be 'text' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Worker configuration loaded from environment variables.
///
/// Everything except `DATABASE_URL` has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub strategy: BaselineStrategy,
    /// Channels per batch.
    pub batch_size: usize,
    /// Channels processed concurrently within a batch.
    pub concurrency: usize,
    pub baseline_interval: Duration,
    pub view_refresh_interval: Duration,
    pub ingest_poll_interval: Duration,
    pub ingest_claim_limit: i64,
    pub short_policy: ShortPolicy,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default       |
    /// |------------------------------|---------------|
    /// | `DATABASE_URL`               | required      |
    /// | `DB_MAX_CONNECTIONS`         | `20`          |
    /// | `BASELINE_STRATEGY`          | `incremental` |
    /// | `BASELINE_BATCH_SIZE`        | `100`         |
    /// | `BASELINE_CONCURRENCY`       | `4`           |
    /// | `BASELINE_INTERVAL_SECS`     | `86400`       |
    /// | `VIEW_REFRESH_INTERVAL_SECS` | `3600`        |
    /// | `INGEST_POLL_INTERVAL_SECS`  | `5`           |
    /// | `INGEST_CLAIM_LIMIT`         | `100`         |
    /// | `SHORT_MAX_DURATION_SECS`    | `60`          |
    /// | `LOG_FORMAT`                 | `text`        |
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> WorkerResult<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| WorkerError::Config("DATABASE_URL must be set".into()))?;

        let max_connections: u32 =
            parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;

        let strategy = match lookup("BASELINE_STRATEGY") {
            Some(raw) => raw.parse::<BaselineStrategy>()?,
            None => BaselineStrategy::default(),
        };

        let batch_size: usize = parse_or(&lookup, "BASELINE_BATCH_SIZE", 100)?;
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(WorkerError::Config(format!(
                "BASELINE_BATCH_SIZE must be in 1..={MAX_BATCH_SIZE}, got {batch_size}"
            )));
        }

        let concurrency: usize = parse_or(&lookup, "BASELINE_CONCURRENCY", 4)?;
        if concurrency == 0 {
            return Err(WorkerError::Config(
                "BASELINE_CONCURRENCY must be at least 1".into(),
            ));
        }

        let baseline_interval = secs(&lookup, "BASELINE_INTERVAL_SECS", 86_400)?;
        let view_refresh_interval = secs(&lookup, "VIEW_REFRESH_INTERVAL_SECS", 3_600)?;
        let ingest_poll_interval = secs(&lookup, "INGEST_POLL_INTERVAL_SECS", 5)?;

        let ingest_claim_limit: i64 = parse_or(&lookup, "INGEST_CLAIM_LIMIT", 100)?;
        if ingest_claim_limit <= 0 {
            return Err(WorkerError::Config(
                "INGEST_CLAIM_LIMIT must be positive".into(),
            ));
        }

        let short_policy = ShortPolicy::new(parse_or(
            &lookup,
            "SHORT_MAX_DURATION_SECS",
            DEFAULT_SHORT_MAX_DURATION_SECS,
        )?)?;

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::Text,
        };

        Ok(Self {
            database_url,
            max_connections,
            strategy,
            batch_size,
            concurrency,
            baseline_interval,
            view_refresh_interval,
            ingest_poll_interval,
            ingest_claim_limit,
            short_policy,
            log_format,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> WorkerResult<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| WorkerError::Config(format!("{key} has invalid value '{raw}'"))),
        None => Ok(default),
    }
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> WorkerResult<Duration> {
    let value: u64 = parse_or(lookup, key, default)?;
    if value == 0 {
        return Err(WorkerError::Config(format!("{key} must be at least 1 second")));
    }
    Ok(Duration::from_secs(value))
}
