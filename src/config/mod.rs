//! Configuration management.
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. environment variables (see [`ENV_VARS`])
//! 4. command-line flags (applied by the binary)
//!
//! # Configuration File Format
//!
//! ```toml
//! [database]
//! host = "localhost"
//! port = 5432
//! dbname = "reading"
//! user = "app"
//! password = "app"
//!
//! [enrichment]
//! batch_size = 500
//! max_books = 0              # 0 = no cap
//! request_delay_ms = 120
//! attempt_cooldown_minutes = 60
//!
//! [http]
//! timeout_secs = 30
//! max_attempts = 6
//! initial_delay_ms = 1000
//! max_delay_secs = 30
//!
//! [api_keys]
//! google_books = "your-api-key"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::sources::{GOOGLE_BOOKS_API_BASE, OPEN_LIBRARY_API_BASE};
use crate::utils::RetryConfig;

/// Recognized environment variables: (primary, alternate, description)
pub const ENV_VARS: &[(&str, Option<&str>, &str)] = &[
    ("PGHOST", Some("PG_HOST"), "Database host"),
    ("PGPORT", Some("PG_PORT"), "Database port"),
    ("PGDATABASE", Some("PG_DB"), "Database name"),
    ("PGUSER", Some("PG_USER"), "Database user"),
    ("PGPASSWORD", Some("PG_PASSWORD"), "Database password"),
    ("BATCH_SIZE", None, "Candidates selected per batch"),
    ("MAX_BOOKS", None, "Stop after this many candidates (0 = all)"),
    ("REQUEST_SLEEP_MS", None, "Pause after each candidate's lookups"),
    (
        "ATTEMPT_COOLDOWN_MIN",
        None,
        "Minutes before a record is attempted again",
    ),
    ("GOOGLE_API_KEY", None, "Optional Google Books API key"),
    ("ENRICH_LOG_LEVEL", None, "Log level (overridden by RUST_LOG)"),
];

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// PostgreSQL connection settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Batch and pacing settings
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeys,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "reading".to_string(),
            user: "app".to_string(),
            password: "app".to_string(),
        }
    }
}

/// Batch and pacing settings for the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Candidates selected (and committed) per batch
    pub batch_size: usize,

    /// Overall cap on processed candidates; `None` or 0 means no cap
    pub max_books: Option<usize>,

    /// Pause after each candidate's lookups, in milliseconds
    pub request_delay_ms: u64,

    /// Minimum minutes between two attempts on the same record
    pub attempt_cooldown_minutes: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_books: None,
            request_delay_ms: 120,
            attempt_cooldown_minutes: 60,
        }
    }
}

impl EnrichmentConfig {
    /// The effective cap (0 is treated as "no cap")
    pub fn max_books(&self) -> Option<usize> {
        self.max_books.filter(|n| *n > 0)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.attempt_cooldown_minutes))
    }
}

/// Outbound HTTP settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Identifying User-Agent sent with every request
    pub user_agent: String,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// Attempts per request, including the first
    pub max_attempts: u32,

    pub initial_delay_ms: u64,

    pub max_delay_secs: u64,

    pub open_library_url: String,

    pub google_books_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "{}/{} (batch metadata enrichment)",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
            timeout_secs: 30,
            max_attempts: 6,
            initial_delay_ms: 1000,
            max_delay_secs: 30,
            open_library_url: OPEN_LIBRARY_API_BASE.to_string(),
            google_books_url: GOOGLE_BOOKS_API_BASE.to_string(),
        }
    }
}

impl HttpConfig {
    /// Backoff policy derived from these settings
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            ..RetryConfig::default()
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Google Books API key (optional, for higher quotas)
    #[serde(default)]
    pub google_books: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,

    /// "json" for JSON lines, anything else for plain text
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file error: {0}")]
    File(#[from] config::ConfigError),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Overlay values from an environment lookup.
    ///
    /// For paired names the primary name wins whenever it is set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pair = |primary: &str, alt: &str| lookup(primary).or_else(|| lookup(alt));

        if let Some(v) = pair("PGHOST", "PG_HOST") {
            self.database.host = v;
        }
        if let Some(v) = pair("PGPORT", "PG_PORT") {
            self.database.port = parse_value("PGPORT", &v)?;
        }
        if let Some(v) = pair("PGDATABASE", "PG_DB") {
            self.database.dbname = v;
        }
        if let Some(v) = pair("PGUSER", "PG_USER") {
            self.database.user = v;
        }
        if let Some(v) = pair("PGPASSWORD", "PG_PASSWORD") {
            self.database.password = v;
        }

        if let Some(v) = lookup("BATCH_SIZE") {
            self.enrichment.batch_size = parse_value("BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("MAX_BOOKS") {
            let cap: usize = parse_value("MAX_BOOKS", &v)?;
            self.enrichment.max_books = (cap > 0).then_some(cap);
        }
        if let Some(v) = lookup("REQUEST_SLEEP_MS") {
            self.enrichment.request_delay_ms = parse_value("REQUEST_SLEEP_MS", &v)?;
        }
        if let Some(v) = lookup("ATTEMPT_COOLDOWN_MIN") {
            self.enrichment.attempt_cooldown_minutes = parse_value("ATTEMPT_COOLDOWN_MIN", &v)?;
        }

        if let Some(v) = lookup("GOOGLE_API_KEY") {
            self.api_keys.google_books = Some(v).filter(|k| !k.trim().is_empty());
        }
        if let Some(v) = lookup("ENRICH_LOG_LEVEL") {
            self.logging.level = v;
        }

        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enrichment.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "enrichment.batch_size must be at least 1".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.database.password = "********".to_string();
        if copy.api_keys.google_books.is_some() {
            copy.api_keys.google_books = Some("********".to_string());
        }
        copy
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Load configuration from an optional file, then overlay the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`] but with an explicit environment lookup
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?,
        None => Config::default(),
    };

    config.apply_env(lookup)?;
    config.validate()?;
    Ok(config)
}
