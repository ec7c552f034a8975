//! Configuration management for the counting service
//!
//! TOML configuration with serde defaults for every field and environment
//! variable overrides applied on top.
//!
//! # Example
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:8080"
//! log_level = "info"
//!
//! [redis]
//! enabled = true
//! url = "redis://127.0.0.1:6379"
//!
//! [query]
//! granularity_secs = 15
//! ```

use crate::error::Error;
use crate::ingestion::DEFAULT_MAX_LINE_BYTES;
use crate::query::validator::DEFAULT_GRANULARITY_SECS;
use crate::redis::{RedisConfig, RedisStoreConfig, RetryPolicy};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming a config file
pub const CONFIG_PATH_ENV: &str = "COUNTER_CONFIG";

/// Config file tried when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "application.toml";

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApplicationConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Redis store settings
    #[serde(default)]
    pub redis: RedisSection,

    /// Query settings
    #[serde(default)]
    pub query: QuerySection,

    /// Ingestion settings
    #[serde(default)]
    pub ingestion: IngestionSection,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// CORS allowed origins (empty = allow any origin)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// Redis store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisSection {
    /// Use Redis; when false the process keeps records in memory
    #[serde(default)]
    pub enabled: bool,

    /// Connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Maximum concurrent commands
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Connect timeout in seconds
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Per-command timeout in seconds
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Retries for a failed command
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Require TLS (`rediss://`)
    #[serde(default)]
    pub tls_enabled: bool,

    /// Key prefix for record slices
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Width of one sorted-set slice in seconds
    #[serde(default = "default_timestep_secs")]
    pub timestep_secs: i64,

    /// Slice expiry in seconds (0 = never)
    #[serde(default)]
    pub key_ttl_secs: u64,
}

/// Query configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuerySection {
    /// Minimum bucket width in seconds
    #[serde(default = "default_granularity_secs")]
    pub granularity_secs: i64,
}

/// Ingestion configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionSection {
    /// Longest accepted NDJSON line in bytes
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_pool_size() -> u32 {
    16
}
fn default_connection_timeout_secs() -> u64 {
    5
}
fn default_command_timeout_secs() -> u64 {
    2
}
fn default_max_retries() -> u32 {
    3
}
fn default_namespace() -> String {
    RedisStoreConfig::default().namespace
}
fn default_timestep_secs() -> i64 {
    RedisStoreConfig::default().timestep_secs
}
fn default_granularity_secs() -> i64 {
    DEFAULT_GRANULARITY_SECS
}
fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            pool_size: default_pool_size(),
            connection_timeout_secs: default_connection_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            max_retries: default_max_retries(),
            tls_enabled: false,
            namespace: default_namespace(),
            timestep_secs: default_timestep_secs(),
            key_ttl_secs: 0,
        }
    }
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            granularity_secs: default_granularity_secs(),
        }
    }
}

impl Default for IngestionSection {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl RedisSection {
    /// Connection pool settings
    pub fn pool_config(&self) -> RedisConfig {
        let retry_policy = RetryPolicy {
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        };

        RedisConfig::with_url(self.url.clone())
            .pool_size(self.pool_size)
            .connection_timeout(Duration::from_secs(self.connection_timeout_secs))
            .command_timeout(Duration::from_secs(self.command_timeout_secs))
            .retry_policy(retry_policy)
            .tls(self.tls_enabled)
    }

    /// Record keyspace layout
    pub fn store_config(&self) -> RedisStoreConfig {
        RedisStoreConfig {
            namespace: self.namespace.clone(),
            timestep_secs: self.timestep_secs,
            key_ttl_secs: self.key_ttl_secs,
        }
    }
}

impl ApplicationConfig {
    /// Load configuration from a TOML file without env overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Defaults with env overrides applied
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// A variable that is set but does not parse is an error.
    pub fn apply_env_overrides(&mut self) -> Result<(), Error> {
        // Server
        if let Ok(addr) = std::env::var("COUNTER_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.server.log_level = log_level;
        }

        // Redis
        if let Ok(url) = std::env::var("COUNTER_REDIS_URL") {
            self.redis.url = url;
        }
        if let Ok(enabled) = std::env::var("COUNTER_REDIS_ENABLED") {
            self.redis.enabled = parse_env("COUNTER_REDIS_ENABLED", &enabled)?;
        }

        // Query
        if let Ok(granularity) = std::env::var("COUNTER_GRANULARITY_SECS") {
            self.query.granularity_secs = parse_env("COUNTER_GRANULARITY_SECS", &granularity)?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Error> {
        if self.server.listen_addr.trim().is_empty() {
            return Err(Error::Configuration("Listen address cannot be empty".to_string()));
        }

        if self.query.granularity_secs < 1 {
            return Err(Error::Configuration(format!(
                "Query granularity must be >= 1 second, got {}",
                self.query.granularity_secs
            )));
        }

        if self.ingestion.max_line_bytes == 0 {
            return Err(Error::Configuration("Ingestion max_line_bytes must be > 0".to_string()));
        }

        if self.redis.enabled {
            self.redis
                .pool_config()
                .validate()
                .map_err(Error::Configuration)?;
        }
        self.redis
            .store_config()
            .validate()
            .map_err(Error::Configuration)?;

        Ok(())
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("Invalid value for {}: {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ApplicationConfig::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.query.granularity_secs, 15);
        assert_eq!(config.redis.timestep_secs, 15);
        assert_eq!(config.ingestion.max_line_bytes, 64 * 1024);
        assert!(!config.redis.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[redis]
enabled = true
url = "redis://cache:6379"
key_ttl_secs = 86400

[query]
granularity_secs = 5
"#
        )
        .unwrap();

        let config = ApplicationConfig::from_file(file.path()).unwrap();
        assert!(config.redis.enabled);
        assert_eq!(config.redis.url, "redis://cache:6379");
        assert_eq!(config.redis.key_ttl_secs, 86400);
        assert_eq!(config.redis.pool_size, 16);
        assert_eq!(config.query.granularity_secs, 5);
        assert_eq!(config.server.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[query]\ngranularity_secs = \"fifteen\"").unwrap();
        assert!(ApplicationConfig::from_file(file.path()).is_err());
        assert!(ApplicationConfig::from_file("/nonexistent/application.toml").is_err());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ApplicationConfig::default();
        config.query.granularity_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ApplicationConfig::default();
        config.redis.timestep_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ApplicationConfig::default();
        config.server.listen_addr = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = ApplicationConfig::default();
        config.redis.enabled = true;
        config.redis.pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("COUNTER_GRANULARITY_SECS", "30");
        std::env::set_var("COUNTER_REDIS_ENABLED", "true");
        let config = ApplicationConfig::from_env().unwrap();
        assert_eq!(config.query.granularity_secs, 30);
        assert!(config.redis.enabled);

        std::env::set_var("COUNTER_GRANULARITY_SECS", "soon");
        assert!(ApplicationConfig::from_env().is_err());

        std::env::remove_var("COUNTER_GRANULARITY_SECS");
        std::env::remove_var("COUNTER_REDIS_ENABLED");
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ApplicationConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: ApplicationConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.redis.namespace, config.redis.namespace);
    }
}
