//! Server configuration loading
//!
//! Runs before tracing is installed, so progress goes to stderr.

use kuba_counter::config::{ApplicationConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE};
use kuba_counter::Error;
use std::path::Path;

/// Load configuration from file or environment
///
/// Base configuration, by priority:
/// 1. COUNTER_CONFIG environment variable
/// 2. application.toml
/// 3. Default configuration
///
/// Environment overrides are applied on top in every case. An override that
/// does not parse fails startup.
pub fn load_config() -> Result<ApplicationConfig, Error> {
    let mut config = base_config();
    config.apply_env_overrides()?;
    Ok(config)
}

fn base_config() -> ApplicationConfig {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        match ApplicationConfig::from_file(&path) {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from: {}", path);
                return config;
            },
            Err(e) => {
                eprintln!(
                    "[config] Failed to load config from {}: {}. Trying {}.",
                    path, e, DEFAULT_CONFIG_FILE
                );
            },
        }
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        match ApplicationConfig::from_file(default_path) {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from {}", DEFAULT_CONFIG_FILE);
                return config;
            },
            Err(e) => {
                eprintln!(
                    "[config] Failed to parse {}: {}. Using defaults.",
                    DEFAULT_CONFIG_FILE, e
                );
            },
        }
    }

    eprintln!("[config] Using default configuration");
    ApplicationConfig::default()
}
