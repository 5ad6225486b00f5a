//! Configuration validation.

use super::{Config, SSL_MODES};
use crate::error::{DumpError, Result};

const SOURCE_TYPES: &[&str] = &["mysql", "mariadb"];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(DumpError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(DumpError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(DumpError::Config("source.user is required".into()));
    }
    if config.source.databases.iter().any(|d| d.trim().is_empty()) {
        return Err(DumpError::Config(
            "source.databases cannot contain empty names".into(),
        ));
    }
    if !SOURCE_TYPES.contains(&config.source.r#type.to_lowercase().as_str()) {
        return Err(DumpError::Config(format!(
            "source.type must be one of {}, got '{}'",
            SOURCE_TYPES.join(", "),
            config.source.r#type
        )));
    }
    if !SSL_MODES.contains(&config.source.ssl_mode.to_lowercase().as_str()) {
        return Err(DumpError::Config(format!(
            "source.ssl_mode must be one of {}, got '{}'",
            SSL_MODES.join(", "),
            config.source.ssl_mode
        )));
    }

    // Dump config validation
    if config.dump.charset.trim().is_empty() {
        return Err(DumpError::Config("dump.charset cannot be empty".into()));
    }
    if !config
        .dump
        .charset
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(DumpError::Config(format!(
            "dump.charset contains invalid characters: '{}'",
            config.dump.charset
        )));
    }
    if config.dump.row_buffer == 0 {
        return Err(DumpError::Config(
            "dump.row_buffer must be at least 1".into(),
        ));
    }
    if config.dump.max_connections == 0 {
        return Err(DumpError::Config(
            "dump.max_connections must be at least 1".into(),
        ));
    }

    Ok(())
}
