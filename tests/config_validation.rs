//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use graph_archive::config::{
    ArchiveConfig, LoggingConfig, ReaderConfig, WriterConfig, DEFAULT_MAX_DEPTH, MAX_ARCHIVE_SIZE,
};
use graph_archive::ArchiveError;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = ArchiveConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_zero_writer_depth() {
    let mut config = ArchiveConfig::default();
    config.writer.max_depth = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Writer max depth must be greater than 0")));
}

#[test]
fn test_high_reader_depth_warning() {
    let mut config = ArchiveConfig::default();
    config.reader.max_depth = 1_000_000;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Reader max depth very high")));
}

#[test]
fn test_tiny_archive_size() {
    let mut config = ArchiveConfig::default();
    config.writer.max_archive_size = 8;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Writer max archive size too small")));
}

#[test]
fn test_archive_size_beyond_wire_limit() {
    let mut config = ArchiveConfig::default();
    config.reader.max_archive_size = MAX_ARCHIVE_SIZE + 1;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Reader max archive size too large")));
}

#[test]
fn test_initial_capacity_larger_than_limit() {
    let config = WriterConfig {
        initial_capacity: 4096,
        max_archive_size: 1024,
        max_depth: DEFAULT_MAX_DEPTH,
    };

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Initial capacity")));
}

#[test]
fn test_text_limit_bounds() {
    let mut config = ReaderConfig {
        max_text_len: 0,
        ..ReaderConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("max text length must be greater than 0")));

    config.max_archive_size = 1024;
    config.max_text_len = 2048;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("exceeds max archive size")));
}

#[test]
fn test_empty_app_name() {
    let mut config = ArchiveConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let mut config = ArchiveConfig::default();
    config.logging.app_name = "a".repeat(100);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("too long")));
}

#[test]
fn test_log_to_file_without_path() {
    let mut config = ArchiveConfig::default();
    config.logging.log_to_file = true;
    config.logging.log_file_path = None;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("log_file_path must be specified")));
}

#[test]
fn test_no_logging_outputs() {
    let config = LoggingConfig {
        log_to_console: false,
        log_to_file: false,
        ..LoggingConfig::default()
    };

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_validate_strict_with_valid_config() {
    let config = ArchiveConfig::default();
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = ArchiveConfig::default();
    config.writer.max_depth = 0;

    let result = config.validate_strict();
    match result {
        Err(ArchiveError::ConfigError(msg)) => {
            assert!(msg.contains("Configuration validation failed"));
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_multiple_validation_errors() {
    let mut config = ArchiveConfig::default();
    config.writer.max_depth = 0;
    config.reader.max_text_len = 0;
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors.len() >= 3, "Should have at least 3 errors");
}

#[test]
fn test_overrides_and_file_roundtrip() {
    let config = ArchiveConfig::default_with_overrides(|c| {
        c.reader.max_depth = 64;
        c.logging.log_level = Level::DEBUG;
        c.logging.json_format = true;
    });

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("archive.toml");
    config.save_to_file(&path).expect("save");

    let loaded = ArchiveConfig::from_file(&path).expect("load");
    assert_eq!(loaded.reader.max_depth, 64);
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert!(loaded.logging.json_format);
    assert!(loaded.validate().is_empty());
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = ArchiveConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ArchiveError::ConfigError(_)));
}

#[test]
fn test_invalid_log_level_rejected() {
    let text = "[logging]\napp_name = \"x\"\nlog_level = \"loud\"\nlog_to_console = true\nlog_to_file = false\njson_format = false\n";
    let err = ArchiveConfig::from_toml(text).unwrap_err();
    assert!(matches!(err, ArchiveError::ConfigError(_)));
}

#[test]
fn test_log_file_in_existing_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = LoggingConfig {
        log_to_file: true,
        log_file_path: Some(dir.path().join("archive.log").display().to_string()),
        ..LoggingConfig::default()
    };
    assert!(config.validate().is_empty());
}
