//! The relational data source capability.
//!
//! The dump engine only talks to a database through [`DataSource`]. Adding a
//! new engine means adding a new implementation under `drivers/`; the
//! serializer and orchestrator stay untouched.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

use super::schema::{ColumnList, TableDescriptor};
use super::value::Row;

/// Default number of rows buffered between the reader task and the writer.
pub const DEFAULT_ROW_BUFFER: usize = 1024;

/// Read schema and rows from a relational database.
///
/// # Errors
///
/// Implementations report unreachable servers, authentication failures and
/// pool timeouts as `DumpError::Connection`, and every server-side statement
/// failure as `DumpError::Query` with a [`QueryErrorKind`] classification.
///
/// [`QueryErrorKind`]: crate::error::QueryErrorKind
#[async_trait]
pub trait DataSource: Send + Sync {
    /// List every relation in the current database, in server order,
    /// including views and other non-dumpable kinds.
    async fn list_tables(&self) -> Result<Vec<TableDescriptor>>;

    /// List the column names of a table in native column order.
    async fn list_columns(&self, table: &str) -> Result<ColumnList>;

    /// The server's native creation statement for a table, verbatim.
    async fn get_create_statement(&self, table: &str) -> Result<String>;

    /// Start streaming the rows of a table.
    ///
    /// Values in each row follow the order of `columns`. The source spawns a
    /// background task that fills a bounded channel, so the caller pulls one
    /// row at a time and never holds the whole table. A failure is delivered
    /// as an `Err` item, after which the channel closes.
    fn query_rows(&self, table: &str, columns: &[String]) -> mpsc::Receiver<Result<Row>>;

    /// Check that the source is reachable.
    async fn test_connection(&self) -> Result<()>;

    /// Name of the database being dumped.
    fn database(&self) -> &str;

    /// Get the database type identifier (e.g., "mysql").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}
