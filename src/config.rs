//! Configuration management for swath extraction
//!
//! TOML configuration with environment variable overrides and defaults:
//! - `[extraction]`: output encoding
//! - `[cache]`: where optimized caches live and how they are read
//! - `[logging]`: log filter and format for the `swath` binary

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Optimized cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Extraction configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Emit plain per-record values instead of typed arrays
    #[serde(default)]
    pub plain_arrays: bool,
}

/// Optimized cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Root directory of optimized caches
    #[serde(default = "default_cache_dir")]
    pub directory: PathBuf,

    /// Verify CRC32 checksums when reading cached variables
    #[serde(default = "default_true")]
    pub verify_checksums: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub structured: bool,
}

fn default_cache_dir() -> PathBuf { PathBuf::from("/var/cache/swath") }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            verify_checksums: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            structured: false,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path, e))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, String> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SWATH_CACHE_DIR") {
            self.cache.directory = PathBuf::from(dir);
        }
        if let Ok(plain) = std::env::var("SWATH_PLAIN_ARRAYS") {
            if let Ok(p) = plain.parse() {
                self.extraction.plain_arrays = p;
            }
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.logging.level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.directory.as_os_str().is_empty() {
            return Err("Cache directory cannot be empty".to_string());
        }
        if self.logging.level.trim().is_empty() {
            return Err("Log level cannot be empty".to_string());
        }
        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &str) -> Result<(), String> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        std::fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file {}: {}", path, e))
    }

    /// Default optimized cache location for a product file
    ///
    /// `<directory>/<product_type>/<file stem>.cache`
    pub fn cache_path_for(&self, product_type: &str, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "product".to_string());
        self.cache
            .directory
            .join(product_type)
            .join(format!("{}.cache", stem))
    }
}
