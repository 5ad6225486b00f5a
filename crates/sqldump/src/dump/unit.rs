//! Per-table dump sequence.

use tokio::io::AsyncWrite;
use tracing::{debug, warn};

use super::ddl::{self, data_header};
use super::emit;
use super::inspector::SchemaInspector;
use super::serializer::RowBatchWriter;
use crate::core::traits::DataSource;
use crate::error::DumpError;

/// A failed table, with the number of tuples already in the script.
///
/// Tuples written before a mid-stream failure stay in the output, closed by
/// `;`, so a replay inserts them.
#[derive(Debug)]
pub struct TableDumpError {
    pub error: DumpError,
    pub rows: u64,
}

impl From<DumpError> for TableDumpError {
    fn from(error: DumpError) -> Self {
        Self { error, rows: 0 }
    }
}

/// Produces the complete script fragment for one table.
pub struct DumpUnitBuilder<'a> {
    source: &'a dyn DataSource,
}

impl<'a> DumpUnitBuilder<'a> {
    pub fn new(source: &'a dyn DataSource) -> Self {
        Self { source }
    }

    /// Dump `table` to the sink and return the number of rows written.
    ///
    /// Order: definition, structure block, columns, data header, rows. A
    /// failure before the structure block leaves the sink untouched. A failure
    /// while rows stream in closes the pending statement and leaves a comment
    /// before the error is returned.
    pub async fn dump_table<W>(
        &self,
        sink: &mut W,
        table: &str,
    ) -> std::result::Result<u64, TableDumpError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let definition = ddl::get_create_statement(self.source, table).await?;
        ddl::write_structure(sink, table, &definition).await?;

        let columns = SchemaInspector::new(self.source)
            .list_columns(table)
            .await?;
        emit(sink, data_header(table)?.as_bytes()).await?;

        let mut rows = self.source.query_rows(table, &columns);
        let mut writer = RowBatchWriter::new(sink, table, &columns)?;

        let outcome = loop {
            match rows.recv().await {
                None => break Ok(()),
                Some(Ok(row)) => {
                    if let Err(e) = writer.push(&row).await {
                        break Err(e);
                    }
                }
                Some(Err(e)) => break Err(e.for_table(table)),
            }
        };
        // Stops the reader task if it is still producing
        drop(rows);

        match outcome {
            Ok(()) => {
                let count = writer.finish().await?;
                debug!("`{}`: {} columns, {} rows", table, columns.len(), count);
                Ok(count)
            }
            Err(e @ DumpError::Sink(_)) => Err(TableDumpError {
                error: e,
                rows: writer.rows(),
            }),
            Err(e) => {
                let rows = writer.abort(&e.to_string()).await?;
                warn!("`{}`: row stream failed after {} rows", table, rows);
                Err(TableDumpError {
                    error: e.for_table(table),
                    rows,
                })
            }
        }
    }
}
