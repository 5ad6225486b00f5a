//! Script generation for a single database.
//!
//! - [`inspector`]: which relations get dumped and with which columns
//! - [`ddl`]: the structure block of each table
//! - [`serializer`]: value escaping and the streamed `INSERT` batch
//! - [`unit`]: the per-table sequence tying the three together
//!
//! Everything writes to an [`AsyncWrite`] sink. Sink failures surface as
//! [`DumpError::Sink`] and always stop the run.

pub mod ddl;
pub mod inspector;
pub mod serializer;
pub mod unit;

pub use ddl::{structure_block, write_structure};
pub use inspector::SchemaInspector;
pub use serializer::{serialize_row, serialize_value, RowBatchWriter};
pub use unit::{DumpUnitBuilder, TableDumpError};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{DumpError, Result};

/// Write bytes to the sink, mapping failures to [`DumpError::Sink`].
pub(crate) async fn emit<W>(sink: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    sink.write_all(bytes).await.map_err(DumpError::Sink)
}

/// Flush the sink.
pub(crate) async fn flush<W>(sink: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    sink.flush().await.map_err(DumpError::Sink)
}
