//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::DEFAULT_ROW_BUFFER;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration.
    pub source: SourceConfig,

    /// Dump behavior configuration.
    #[serde(default)]
    pub dump: DumpConfig,
}

/// SSL modes accepted for `source.ssl_mode`.
pub const SSL_MODES: &[&str] = &["disabled", "preferred", "required"];

/// Source database (MySQL/MariaDB) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (only "mysql" for now).
    #[serde(default = "default_mysql")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Further databases on the same server, dumped by the same run.
    #[serde(default)]
    pub databases: Vec<String>,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disabled, preferred or required (default: preferred).
    #[serde(default = "default_preferred")]
    pub ssl_mode: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("databases", &self.databases)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Dump behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Character set announced with `SET NAMES` in the preamble (default: utf8).
    #[serde(default = "default_charset")]
    pub charset: String,

    /// Wrap the script in `SET FOREIGN_KEY_CHECKS = 0/1` (default: true).
    #[serde(default = "default_true")]
    pub disable_foreign_key_checks: bool,

    /// Tables skipped during a whole-database dump (exact names).
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Rows buffered between the reader task and the writer.
    #[serde(default = "default_row_buffer")]
    pub row_buffer: usize,

    /// Maximum connections in the source pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            charset: default_charset(),
            disable_foreign_key_checks: true,
            exclude_tables: Vec::new(),
            row_buffer: DEFAULT_ROW_BUFFER,
            max_connections: default_max_connections(),
        }
    }
}

impl DumpConfig {
    /// Whether a table is excluded from whole-database dumps.
    pub fn is_excluded(&self, table: &str) -> bool {
        self.exclude_tables.iter().any(|t| t == table)
    }
}

// Default value functions for serde
fn default_mysql() -> String {
    "mysql".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_preferred() -> String {
    "preferred".to_string()
}

fn default_charset() -> String {
    "utf8".to_string()
}

fn default_row_buffer() -> usize {
    DEFAULT_ROW_BUFFER
}

fn default_max_connections() -> usize {
    2
}

fn default_true() -> bool {
    true
}
