//! Server and pipeline configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use courier_pipeline::config::{ListenerConfig, PipelineConfig, ScannerConfig};
use courier_pipeline::retry::RetryPolicy;

use crate::error::AppError;

/// Startup configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// `DATABASE_URL`. Required.
    pub database_url: String,
    /// `HOST`, default `0.0.0.0`.
    pub host: String,
    /// `PORT`, default `3000`.
    pub port: u16,
    /// `DATABASE_MAX_CONNECTIONS`, default 10.
    pub database_max_connections: u32,
    /// Pipeline settings from the `OUTBOX_*` and `DELIVERY_*` variables.
    pub pipeline: PipelineConfig,
    /// `DELIVERY_SIMULATED_LATENCY_MS`, default 100.
    pub delivery_latency: Duration,
}

impl Config {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or any
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or any
    /// variable fails to parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let env = Env(&lookup);
        let defaults = PipelineConfig::default();

        let database_url = env
            .get("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL environment variable must be set".into()))?;

        let pipeline = PipelineConfig {
            change_feed_enabled: env.parse_or("OUTBOX_CHANGE_FEED_ENABLED", true)?,
            listener: ListenerConfig::default(),
            scanner: ScannerConfig {
                interval: env.millis_or("OUTBOX_SCAN_INTERVAL_MS", 5_000)?,
                batch_size: env.parse_or("OUTBOX_SCAN_BATCH_SIZE", 100)?,
                grace_period: env.millis_or("OUTBOX_GRACE_PERIOD_MS", 0)?,
                stale_claim_timeout: env
                    .parse::<u64>("OUTBOX_STALE_CLAIM_TIMEOUT_MS")?
                    .map(Duration::from_millis),
            },
            event_retry: RetryPolicy {
                max_attempts: env.parse_or("OUTBOX_MAX_ATTEMPTS", 1)?,
                initial_backoff: env.millis_or("OUTBOX_RETRY_BACKOFF_MS", 1_000)?,
                max_backoff: Duration::from_secs(300),
            },
            delivery_retry: RetryPolicy {
                max_attempts: env.parse_or("DELIVERY_MAX_ATTEMPTS", 3)?,
                initial_backoff: env.millis_or("DELIVERY_RETRY_BACKOFF_MS", 200)?,
                max_backoff: defaults.delivery_retry.max_backoff,
            },
        };

        if pipeline.scanner.batch_size < 1 {
            return Err(AppError::Config(
                "OUTBOX_SCAN_BATCH_SIZE must be at least 1".into(),
            ));
        }
        if pipeline.event_retry.max_attempts < 1 || pipeline.delivery_retry.max_attempts < 1 {
            return Err(AppError::Config(
                "OUTBOX_MAX_ATTEMPTS and DELIVERY_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }

        Ok(Self {
            database_url,
            host: env.get("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: env.parse_or("PORT", 3000)?,
            database_max_connections: env.parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            pipeline,
            delivery_latency: env.millis_or("DELIVERY_SIMULATED_LATENCY_MS", 100)?,
        })
    }

    /// The address to listen on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
            })
            .transpose()
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }

    fn millis_or(&self, key: &str, default_ms: u64) -> Result<Duration, AppError> {
        self.parse_or(key, default_ms).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/courier")]).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_max_connections, 10);
        assert!(config.pipeline.change_feed_enabled);
        assert_eq!(config.pipeline.scanner.interval, Duration::from_secs(5));
        assert_eq!(config.pipeline.scanner.batch_size, 100);
        assert_eq!(config.pipeline.scanner.grace_period, Duration::ZERO);
        assert!(config.pipeline.scanner.stale_claim_timeout.is_none());
        assert_eq!(config.pipeline.event_retry.max_attempts, 1);
        assert_eq!(config.pipeline.delivery_retry.max_attempts, 3);
        assert_eq!(config.delivery_latency, Duration::from_millis(100));
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = config_from(&[]);

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/courier"),
            ("PORT", "8080"),
            ("OUTBOX_CHANGE_FEED_ENABLED", "false"),
            ("OUTBOX_SCAN_INTERVAL_MS", "250"),
            ("OUTBOX_MAX_ATTEMPTS", "5"),
            ("OUTBOX_STALE_CLAIM_TIMEOUT_MS", "60000"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert!(!config.pipeline.change_feed_enabled);
        assert_eq!(config.pipeline.scanner.interval, Duration::from_millis(250));
        assert_eq!(config.pipeline.event_retry.max_attempts, 5);
        assert_eq!(
            config.pipeline.scanner.stale_claim_timeout,
            Some(Duration::from_secs(60))
        );
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_unparseable_values_are_rejected() {
        let result = config_from(&[
            ("DATABASE_URL", "postgres://localhost/courier"),
            ("PORT", "eighty"),
        ]);

        match result {
            Err(AppError::Config(message)) => assert!(message.contains("PORT")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let result = config_from(&[
            ("DATABASE_URL", "postgres://localhost/courier"),
            ("OUTBOX_SCAN_BATCH_SIZE", "0"),
        ]);

        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
