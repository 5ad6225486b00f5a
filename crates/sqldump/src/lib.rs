//! # sqldump
//!
//! Logical dump library for MySQL/MariaDB databases.
//!
//! Walks every base table of a database and writes a replayable SQL script:
//!
//! - **Structure** as `DROP TABLE IF EXISTS` plus the server's own `CREATE`
//!   statement
//! - **Data** as one streamed multi-row `INSERT` per table, wrapped in
//!   `LOCK TABLES`
//! - **Byte-exact escaping** of raw field values, binary included
//! - **Per-table failure isolation** with a structured [`DumpReport`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqldump::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sqldump::DumpError> {
//!     let config = Config::load("sqldump.yaml")?;
//!     let orchestrator = Orchestrator::connect(config).await?;
//!     let mut out = tokio::fs::File::create("shop.sql").await?;
//!     let report = orchestrator.dump_all(&mut out).await?;
//!     println!("Dumped {} rows", report.rows_dumped);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod dump;
pub mod error;
pub mod orchestrator;

// Re-exports for convenient access
pub use config::{Config, DumpConfig, SourceConfig};
pub use crate::core::{DataSource, Row, TableDescriptor, TableKind};
pub use drivers::{MemorySource, MemoryTable, MysqlSource};
pub use error::{DumpError, QueryErrorKind, Result};
pub use orchestrator::{DumpReport, DumpStatus, HealthCheckResult, Orchestrator, TableOutcome};
