//! Relation discovery.

use tracing::debug;

use crate::core::schema::{ColumnList, TableDescriptor};
use crate::core::traits::DataSource;
use crate::error::{DumpError, Result};

/// Answers which tables a dump covers and what their columns are.
pub struct SchemaInspector<'a> {
    source: &'a dyn DataSource,
}

impl<'a> SchemaInspector<'a> {
    pub fn new(source: &'a dyn DataSource) -> Self {
        Self { source }
    }

    /// Base tables of the database, in server order.
    ///
    /// Views and any other relation kind are left out; their contents are
    /// not independent data.
    pub async fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        let relations = self.source.list_tables().await?;
        let total = relations.len();

        let tables: Vec<TableDescriptor> = relations
            .into_iter()
            .filter(|t| {
                if !t.is_dumpable() {
                    debug!("Skipping {} `{}`", t.kind, t.name);
                }
                t.is_dumpable()
            })
            .collect();

        debug!(
            "Found {} base tables ({} relations) in '{}'",
            tables.len(),
            total,
            self.source.database()
        );
        Ok(tables)
    }

    /// Column names of `table` in definition order.
    ///
    /// A table that yields no columns is reported as not found.
    pub async fn list_columns(&self, table: &str) -> Result<ColumnList> {
        let columns = self
            .source
            .list_columns(table)
            .await
            .map_err(|e| e.for_table(table))?;
        if columns.is_empty() {
            return Err(DumpError::not_found(table, "table has no columns"));
        }
        Ok(columns)
    }
}
