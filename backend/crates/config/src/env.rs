use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use hubsync_common::error::{HubsyncError, HubsyncResult};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: String,
    /// Hard wall-clock deadline for one entity pipeline.
    pub sync_timeout_secs: u64,
    /// Incremental horizon used when no successful run exists yet.
    pub sync_fallback_days: u32,
    pub sync_batch_size: usize,
    pub sync_log_path: PathBuf,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> HubsyncResult<Self> {
        let _ = dotenvy::dotenv();

        let sync_batch_size: usize = parse_var_or("SYNC_BATCH_SIZE", 500)?;
        if sync_batch_size == 0 {
            return Err(HubsyncError::Config(
                "SYNC_BATCH_SIZE must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            db_max_connections: parse_var_or("DB_MAX_CONNECTIONS", 10)?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            sync_timeout_secs: parse_var_or("SYNC_TIMEOUT_SECS", 1800)?,
            sync_fallback_days: parse_var_or("SYNC_FALLBACK_DAYS", 7)?,
            sync_batch_size,
            sync_log_path: PathBuf::from(get_var_or("SYNC_LOG_PATH", "logs/sync-runs.jsonl")),
        })
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

fn get_var(key: &str) -> HubsyncResult<String> {
    env::var(key).map_err(|_| HubsyncError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var_or<T>(key: &str, default: T) -> HubsyncResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| HubsyncError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_optional_vars() {
        for key in [
            "DB_MAX_CONNECTIONS",
            "SYNC_TIMEOUT_SECS",
            "SYNC_FALLBACK_DAYS",
            "SYNC_BATCH_SIZE",
            "SYNC_LOG_PATH",
            "LOG_LEVEL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn config_from_env_applies_defaults() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_optional_vars();
        env::set_var("DATABASE_URL", "postgres://localhost/hubsync_test");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.database_url, "postgres://localhost/hubsync_test");
        assert_eq!(cfg.db_max_connections, 10);
        assert_eq!(cfg.sync_timeout(), Duration::from_secs(1800));
        assert_eq!(cfg.sync_fallback_days, 7);
        assert_eq!(cfg.sync_batch_size, 500);
        assert_eq!(cfg.sync_log_path, PathBuf::from("logs/sync-runs.jsonl"));
        assert_eq!(cfg.log_level, "info");

        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn config_reads_log_level() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_optional_vars();
        env::set_var("DATABASE_URL", "postgres://localhost/hubsync_test");
        env::set_var("LOG_LEVEL", "hubsync_ingest=debug");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.log_level, "hubsync_ingest=debug");

        env::remove_var("LOG_LEVEL");
        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn config_from_env_fails_without_database_url() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::remove_var("DATABASE_URL");
        let result = AppConfig::from_env();
        assert!(matches!(result, Err(HubsyncError::Config(_))));
    }

    #[test]
    fn config_rejects_unparseable_timeout() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_optional_vars();
        env::set_var("DATABASE_URL", "postgres://localhost/hubsync_test");
        env::set_var("SYNC_TIMEOUT_SECS", "half an hour");

        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("SYNC_TIMEOUT_SECS"), "got: {err}");

        env::remove_var("SYNC_TIMEOUT_SECS");
        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn config_rejects_zero_batch_size() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_optional_vars();
        env::set_var("DATABASE_URL", "postgres://localhost/hubsync_test");
        env::set_var("SYNC_BATCH_SIZE", "0");

        assert!(AppConfig::from_env().is_err());

        env::remove_var("SYNC_BATCH_SIZE");
        env::remove_var("DATABASE_URL");
    }
}
