//! Database driver implementations.
//!
//! This module provides engine-specific implementations of
//! [`DataSource`]:
//!
//! - [`mysql`]: MySQL/MariaDB over an SQLx pool
//! - [`memory`]: in-process tables for fixtures and tests
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/` (e.g., `drivers/postgres/`)
//! 2. Implement [`DataSource`], classifying server errors into
//!    [`QueryErrorKind`](crate::error::QueryErrorKind)
//! 3. Add a match arm to [`connect`]

pub mod memory;
pub mod mysql;

pub use memory::{MemorySource, MemoryTable};
pub use mysql::MysqlSource;

use std::sync::Arc;

use crate::config::Config;
use crate::core::traits::DataSource;
use crate::error::{DumpError, Result};

/// Open the data source described by the configuration.
///
/// # Errors
///
/// Returns `Config` for an unknown database type and `Connection` when the
/// server cannot be reached.
pub async fn connect(config: &Config) -> Result<Arc<dyn DataSource>> {
    match config.source.r#type.to_lowercase().as_str() {
        "mysql" | "mariadb" => {
            let source = MysqlSource::new(&config.source, &config.dump).await?;
            Ok(Arc::new(source))
        }
        other => Err(DumpError::Config(format!(
            "Unknown database type: '{}'. Supported types: mysql",
            other
        ))),
    }
}
