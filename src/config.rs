//! # Configuration Management
//!
//! Centralized configuration for archive writers and readers.
//!
//! This module provides structured configuration for encode and decode sessions: buffer
//! sizing, resource limits, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Safety Considerations
//! - Offsets on the wire are `u32`, so no archive can exceed 4 GiB
//! - The depth limit bounds recursion on long reference chains
//! - The text limit bounds allocations driven by untrusted length prefixes

use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// End marker written after the trailer of every archive
pub const WIRE_MAGIC: [u8; 4] = *b"GARC";

/// Largest archive the wire format can address
pub const MAX_ARCHIVE_SIZE: usize = u32::MAX as usize;

/// Default limit on nested object bodies; fits a 2 MiB thread stack in debug builds
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Default initial capacity of a writer's buffer
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Default limit on a single text or byte run (16 MB)
pub const DEFAULT_MAX_TEXT_LEN: usize = 16 * 1024 * 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ArchiveConfig {
    /// Writer-specific configuration
    #[serde(default)]
    pub writer: WriterConfig,

    /// Reader-specific configuration
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ArchiveConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ArchiveError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ArchiveError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ArchiveError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(capacity) = std::env::var("GRAPH_ARCHIVE_INITIAL_CAPACITY") {
            if let Ok(val) = capacity.parse::<usize>() {
                config.writer.initial_capacity = val;
            }
        }

        if let Ok(size) = std::env::var("GRAPH_ARCHIVE_MAX_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.writer.max_archive_size = val;
                config.reader.max_archive_size = val;
            }
        }

        if let Ok(depth) = std::env::var("GRAPH_ARCHIVE_MAX_DEPTH") {
            if let Ok(val) = depth.parse::<usize>() {
                config.writer.max_depth = val;
                config.reader.max_depth = val;
            }
        }

        if let Ok(text) = std::env::var("GRAPH_ARCHIVE_MAX_TEXT_LEN") {
            if let Ok(val) = text.parse::<usize>() {
                config.reader.max_text_len = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ArchiveError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ArchiveError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.writer.validate());
        errors.extend(self.reader.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ArchiveError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Writer-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriterConfig {
    /// Bytes reserved up front in the writer's buffer
    pub initial_capacity: usize,

    /// Largest archive the writer may produce, trailer included
    pub max_archive_size: usize,

    /// Deepest allowed nesting of object bodies
    pub max_depth: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_archive_size: MAX_ARCHIVE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl WriterConfig {
    /// Validate writer configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.initial_capacity > self.max_archive_size {
            errors.push(format!(
                "Initial capacity {} exceeds max archive size {}",
                self.initial_capacity, self.max_archive_size
            ));
        }

        errors.extend(validate_limits("Writer", self.max_archive_size, self.max_depth));
        errors
    }
}

/// Reader-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReaderConfig {
    /// Largest buffer the reader accepts
    pub max_archive_size: usize,

    /// Deepest allowed nesting of object bodies
    pub max_depth: usize,

    /// Longest text or byte run accepted
    pub max_text_len: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_archive_size: MAX_ARCHIVE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }
}

impl ReaderConfig {
    /// Validate reader configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = validate_limits("Reader", self.max_archive_size, self.max_depth);

        if self.max_text_len == 0 {
            errors.push("Reader max text length must be greater than 0".to_string());
        } else if self.max_text_len > self.max_archive_size {
            errors.push(format!(
                "Reader max text length {} exceeds max archive size {}",
                self.max_text_len, self.max_archive_size
            ));
        }

        errors
    }
}

fn validate_limits(side: &str, max_archive_size: usize, max_depth: usize) -> Vec<String> {
    let mut errors = Vec::new();

    // Smallest archive is an empty body plus the trailer
    if max_archive_size < 12 {
        errors.push(format!(
            "{side} max archive size too small: {max_archive_size} bytes (minimum: 12)"
        ));
    } else if max_archive_size > MAX_ARCHIVE_SIZE {
        errors.push(format!(
            "{side} max archive size too large: {max_archive_size} bytes (wire limit: {MAX_ARCHIVE_SIZE})"
        ));
    }

    if max_depth == 0 {
        errors.push(format!("{side} max depth must be greater than 0"));
    } else if max_depth > 1024 {
        errors.push(format!(
            "{side} max depth very high: {max_depth} (deep graphs may overflow the stack)"
        ));
    }

    errors
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("graph-archive"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
