//! Runtime configuration.
//!
//! Everything is read from the environment (after `.env` is loaded). Connections
//! are addressed by a credential profile name: profile `minio_conn` looks up
//! `MINIO_CONN_ENDPOINT` before falling back to the plain `S3_ENDPOINT`, and so on.

use std::env;
use std::time::Duration;

use crate::errors::AppError;

pub const DEFAULT_BUCKET: &str = "raw-data";
pub const DEFAULT_KEY_PATTERN: &str = "*.json";
pub const DEFAULT_STORAGE_PROFILE: &str = "minio_conn";
pub const DEFAULT_DATABASE_PROFILE: &str = "postgres_dw";
pub const DEFAULT_CURRENCY_PAIR: &str = "USDBRL";
pub const DEFAULT_TABLE: &str = "cotacao_dolar";
/// Minute 10 of every hour (sec min hour day month weekday).
pub const DEFAULT_SCHEDULE: &str = "0 10 * * * *";
pub const DEFAULT_POKE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 18 * 60 * 60;
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5 * 60;

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Env prefix for a credential profile: `minio_conn` -> `MINIO_CONN`.
pub fn profile_prefix(profile: &str) -> String {
    profile
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Tries `{PROFILE}_{KEY}` first, then each fallback key in order.
fn profiled_env_opt(profile: &str, key: &str, fallbacks: &[&str]) -> Option<String> {
    let prefix = profile_prefix(profile);
    if !prefix.is_empty() {
        if let Some(v) = env_opt(&format!("{}_{}", prefix, key)) {
            return Some(v);
        }
    }
    fallbacks.iter().find_map(|k| env_opt(k))
}

#[derive(Debug, Clone)]
pub struct StorageConnection {
    pub profile: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub allow_http: bool,
}

impl StorageConnection {
    pub fn from_profile(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            endpoint: profiled_env_opt(profile, "ENDPOINT", &["S3_ENDPOINT", "AWS_ENDPOINT_URL"]),
            region: profiled_env_opt(profile, "REGION", &["AWS_REGION", "AWS_DEFAULT_REGION"])
                .unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id: profiled_env_opt(profile, "ACCESS_KEY_ID", &["AWS_ACCESS_KEY_ID"]),
            secret_access_key: profiled_env_opt(
                profile,
                "SECRET_ACCESS_KEY",
                &["AWS_SECRET_ACCESS_KEY"],
            ),
            allow_http: profiled_env_opt(profile, "ALLOW_HTTP", &["S3_ALLOW_HTTP"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pub profile: String,
    pub url: Option<String>,
    pub max_connections: u32,
}

impl DatabaseConnection {
    pub fn from_profile(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            url: profiled_env_opt(profile, "URL", &["DATABASE_URL"]),
            max_connections: profiled_env_opt(profile, "MAX_CONNECTIONS", &["DB_MAX_CONNECTIONS"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }

    pub fn require_url(&self) -> Result<&str, AppError> {
        self.url.as_deref().ok_or_else(|| {
            AppError::Config(format!(
                "no database url for profile '{}' (set {}_URL or DATABASE_URL)",
                self.profile,
                profile_prefix(&self.profile)
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub key_pattern: String,
    pub poke_interval: Duration,
    pub timeout: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            key_pattern: DEFAULT_KEY_PATTERN.to_string(),
            poke_interval: Duration::from_secs(DEFAULT_POKE_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_WATCH_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub bucket: String,
    pub currency_pair: String,
    pub table: String,
    pub schedule: String,
    pub watcher: WatcherConfig,
    pub retry: RetryPolicy,
    pub storage: StorageConnection,
    pub database: DatabaseConnection,
    pub http_port: u16,
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let storage_profile = env_or("STORAGE_CONN_ID", DEFAULT_STORAGE_PROFILE);
        let database_profile = env_or("DB_CONN_ID", DEFAULT_DATABASE_PROFILE);

        Self {
            bucket: env_or("BUCKET_NAME", DEFAULT_BUCKET),
            currency_pair: env_or("CURRENCY_PAIR", DEFAULT_CURRENCY_PAIR),
            table: env_or("QUOTE_TABLE", DEFAULT_TABLE),
            schedule: env_or("INGEST_SCHEDULE", DEFAULT_SCHEDULE),
            watcher: WatcherConfig {
                key_pattern: env_or("WATCH_KEY_PATTERN", DEFAULT_KEY_PATTERN),
                poke_interval: Duration::from_secs(env_parse(
                    "WATCH_POKE_INTERVAL_SECS",
                    DEFAULT_POKE_INTERVAL_SECS,
                )),
                timeout: Duration::from_secs(env_parse(
                    "WATCH_TIMEOUT_SECS",
                    DEFAULT_WATCH_TIMEOUT_SECS,
                )),
            },
            retry: RetryPolicy {
                retries: env_parse("JOB_RETRIES", DEFAULT_RETRIES),
                retry_delay: Duration::from_secs(env_parse(
                    "JOB_RETRY_DELAY_SECS",
                    DEFAULT_RETRY_DELAY_SECS,
                )),
            },
            storage: StorageConnection::from_profile(&storage_profile),
            database: DatabaseConnection::from_profile(&database_profile),
            http_port: env_parse("HTTP_PORT", 3000),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.bucket.is_empty() {
            return Err(AppError::Config("BUCKET_NAME is empty".into()));
        }
        if !is_sql_identifier(&self.table) {
            return Err(AppError::Config(format!(
                "QUOTE_TABLE '{}' is not a plain SQL identifier",
                self.table
            )));
        }
        if self.watcher.poke_interval.is_zero() {
            return Err(AppError::Config("WATCH_POKE_INTERVAL_SECS must be > 0".into()));
        }
        Ok(())
    }
}

/// The table name is spliced into DDL, so only `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_prefix() {
        assert_eq!(profile_prefix("minio_conn"), "MINIO_CONN");
        assert_eq!(profile_prefix("postgres-dw"), "POSTGRES_DW");
    }

    #[test]
    fn test_defaults_match_hourly_schedule() {
        let watcher = WatcherConfig::default();
        assert_eq!(watcher.poke_interval, Duration::from_secs(60));
        assert_eq!(watcher.timeout, Duration::from_secs(64_800));

        let retry = RetryPolicy::default();
        assert_eq!(retry.retries, 1);
        assert_eq!(retry.retry_delay, Duration::from_secs(300));
        assert_eq!(DEFAULT_SCHEDULE, "0 10 * * * *");
    }

    #[test]
    fn test_profiled_lookup_prefers_prefixed_key() {
        env::set_var("QI_TEST_PROFILE_URL", "postgres://profiled/db");
        let conn = DatabaseConnection::from_profile("qi_test_profile");
        assert_eq!(conn.url.as_deref(), Some("postgres://profiled/db"));
        env::remove_var("QI_TEST_PROFILE_URL");
    }

    #[test]
    fn test_sql_identifier() {
        assert!(is_sql_identifier("cotacao_dolar"));
        assert!(is_sql_identifier("_t1"));
        assert!(!is_sql_identifier("1table"));
        assert!(!is_sql_identifier("drop table; --"));
        assert!(!is_sql_identifier(""));
    }
}
