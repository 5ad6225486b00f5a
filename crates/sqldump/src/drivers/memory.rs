//! In-process data source.
//!
//! Holds tables, their definitions and rows in memory and serves them through
//! the same [`DataSource`] contract as a live server, including the background
//! reader task and bounded row channel. Used for fixtures, tests and dry runs
//! of the script format. Failures can be injected per table to exercise the
//! engine's error isolation.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::schema::{ColumnList, TableDescriptor, TableKind};
use crate::core::traits::{DataSource, DEFAULT_ROW_BUFFER};
use crate::core::value::Row;
use crate::error::{DumpError, QueryErrorKind, Result};

/// An injected failure.
#[derive(Debug, Clone)]
enum Failure {
    Query(QueryErrorKind, String),
    Connection(String),
}

impl Failure {
    fn to_error(&self, table: &str) -> DumpError {
        match self {
            Failure::Query(kind, message) => DumpError::Query {
                table: Some(table.to_string()),
                kind: *kind,
                message: message.clone(),
            },
            Failure::Connection(message) => DumpError::Connection(message.clone()),
        }
    }
}

/// A table (or view) held by [`MemorySource`].
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    kind: TableKind,
    columns: Vec<String>,
    create_statement: String,
    rows: Vec<Row>,
    definition_failure: Option<Failure>,
    row_failure: Option<(usize, Failure)>,
}

impl MemoryTable {
    /// A base table with a generated `CREATE TABLE` statement.
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        let name = name.into();
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let create_statement = generated_create_statement(&name, &columns);
        Self {
            name,
            kind: TableKind::BaseTable,
            columns,
            create_statement,
            rows: Vec::new(),
            definition_failure: None,
            row_failure: None,
        }
    }

    /// A view over the given columns.
    pub fn view(name: impl Into<String>, columns: &[&str]) -> Self {
        let mut table = Self::new(name, columns);
        table.kind = TableKind::Other("VIEW".to_string());
        table.create_statement = format!(
            "CREATE VIEW `{}` AS select 1",
            table.name.replace('`', "``")
        );
        table
    }

    /// Replace the generated definition with a verbatim one.
    pub fn with_create_statement(mut self, ddl: impl Into<String>) -> Self {
        self.create_statement = ddl.into();
        self
    }

    /// Append a row of text fields (`None` is NULL) in column order.
    pub fn with_row<'a, I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        self.rows.push(Row::from_text(fields));
        self
    }

    /// Append a row of raw values in column order.
    pub fn with_raw_row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    /// Make `get_create_statement` fail with a query error.
    pub fn fail_definition(mut self, kind: QueryErrorKind, message: impl Into<String>) -> Self {
        self.definition_failure = Some(Failure::Query(kind, message.into()));
        self
    }

    /// Deliver `after` rows, then a query error.
    pub fn fail_rows_after(
        mut self,
        after: usize,
        kind: QueryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        self.row_failure = Some((after, Failure::Query(kind, message.into())));
        self
    }

    /// Deliver `after` rows, then a connection error.
    pub fn drop_connection_after(mut self, after: usize, message: impl Into<String>) -> Self {
        self.row_failure = Some((after, Failure::Connection(message.into())));
        self
    }

    /// Row values reordered to `columns`.
    fn project(&self, columns: &[String]) -> Result<Vec<Row>> {
        let indexes = columns
            .iter()
            .map(|c| {
                self.columns.iter().position(|own| own == c).ok_or_else(|| {
                    DumpError::Query {
                        table: Some(self.name.clone()),
                        kind: QueryErrorKind::NotFound,
                        message: format!("Unknown column '{}' in 'field list'", c),
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self
            .rows
            .iter()
            .map(|row| {
                Row::new(
                    indexes
                        .iter()
                        .map(|&i| row.get(i).flatten().map(|b| b.to_vec()))
                        .collect(),
                )
            })
            .collect())
    }
}

/// In-memory [`DataSource`].
///
/// ```
/// use sqldump::drivers::{MemorySource, MemoryTable};
///
/// let source = MemorySource::new("gotest").with_table(
///     MemoryTable::new("test", &["id", "name"]).with_row([Some("1"), Some("a")]),
/// );
/// # let _ = source;
/// ```
#[derive(Debug, Clone)]
pub struct MemorySource {
    database: String,
    tables: Vec<MemoryTable>,
    unreachable: Option<String>,
    row_buffer: usize,
}

impl MemorySource {
    /// An empty database.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            tables: Vec::new(),
            unreachable: None,
            row_buffer: DEFAULT_ROW_BUFFER,
        }
    }

    /// Add a table; listing order follows insertion order.
    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.tables.push(table);
        self
    }

    /// Capacity of the row channel.
    pub fn with_row_buffer(mut self, row_buffer: usize) -> Self {
        self.row_buffer = row_buffer.max(1);
        self
    }

    /// Make every call fail as if the server could not be reached.
    pub fn unreachable(mut self, message: impl Into<String>) -> Self {
        self.unreachable = Some(message.into());
        self
    }

    fn check_reachable(&self) -> Result<()> {
        match &self.unreachable {
            Some(message) => Err(DumpError::Connection(message.clone())),
            None => Ok(()),
        }
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables.iter().find(|t| t.name == name).ok_or_else(|| {
            DumpError::not_found(
                name,
                format!("Table '{}.{}' doesn't exist", self.database, name),
            )
        })
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        self.check_reachable()?;
        Ok(self
            .tables
            .iter()
            .map(|t| TableDescriptor {
                name: t.name.clone(),
                kind: t.kind.clone(),
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<ColumnList> {
        self.check_reachable()?;
        Ok(self.table(table)?.columns.clone())
    }

    async fn get_create_statement(&self, table: &str) -> Result<String> {
        self.check_reachable()?;
        let t = self.table(table)?;
        if let Some(failure) = &t.definition_failure {
            return Err(failure.to_error(table));
        }
        Ok(t.create_statement.clone())
    }

    fn query_rows(&self, table: &str, columns: &[String]) -> mpsc::Receiver<Result<Row>> {
        let (tx, rx) = mpsc::channel(self.row_buffer);

        let prepared = self.check_reachable().and_then(|_| {
            let t = self.table(table)?;
            let rows = t.project(columns)?;
            Ok((rows, t.row_failure.clone()))
        });
        let table = table.to_string();

        tokio::spawn(async move {
            let (rows, failure) = match prepared {
                Ok(p) => p,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            for (idx, row) in rows.into_iter().enumerate() {
                if let Some((after, failure)) = &failure {
                    if idx == *after {
                        let _ = tx.send(Err(failure.to_error(&table))).await;
                        return;
                    }
                }
                if tx.send(Ok(row)).await.is_err() {
                    debug!("Row receiver for `{}` dropped", table);
                    return;
                }
            }

            // Failure injected past the last row
            if let Some((_, failure)) = &failure {
                let _ = tx.send(Err(failure.to_error(&table))).await;
            }
        });

        rx
    }

    async fn test_connection(&self) -> Result<()> {
        self.check_reachable()
    }

    fn database(&self) -> &str {
        &self.database
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

fn generated_create_statement(name: &str, columns: &[String]) -> String {
    let body = columns
        .iter()
        .map(|c| format!("  `{}` varchar(255) DEFAULT NULL", c.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "CREATE TABLE `{}` (\n{}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8",
        name.replace('`', "``"),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut rx: mpsc::Receiver<Result<Row>>) -> Vec<Result<Row>> {
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn test_lists_tables_in_insertion_order_with_kinds() {
        let source = MemorySource::new("gotest")
            .with_table(MemoryTable::new("b", &["id"]))
            .with_table(MemoryTable::view("v", &["id"]))
            .with_table(MemoryTable::new("a", &["id"]));

        let tables = source.list_tables().await.unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["b", "v", "a"]);
        assert!(!tables[1].is_dumpable());
    }

    #[tokio::test]
    async fn test_generated_create_statement() {
        let source = MemorySource::new("gotest").with_table(MemoryTable::new("t", &["id", "name"]));
        assert_eq!(
            source.get_create_statement("t").await.unwrap(),
            "CREATE TABLE `t` (\n  `id` varchar(255) DEFAULT NULL,\n  `name` varchar(255) DEFAULT NULL\n) ENGINE=InnoDB DEFAULT CHARSET=utf8"
        );
    }

    #[tokio::test]
    async fn test_missing_table_is_not_found() {
        let source = MemorySource::new("gotest");
        let err = source.list_columns("test").await.unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::NotFound));
        assert!(err.to_string().contains("doesn't exist"));
    }

    #[tokio::test]
    async fn test_query_rows_projects_requested_order() {
        let source = MemorySource::new("gotest").with_table(
            MemoryTable::new("t", &["id", "name"]).with_row([Some("1"), Some("a")]),
        );
        let cols = vec!["name".to_string(), "id".to_string()];
        let rows = collect(source.query_rows("t", &cols)).await;
        assert_eq!(rows.len(), 1);
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.get(0), Some(Some(&b"a"[..])));
        assert_eq!(row.get(1), Some(Some(&b"1"[..])));
    }

    #[tokio::test]
    async fn test_query_rows_streams_past_buffer_capacity() {
        let mut table = MemoryTable::new("t", &["id"]);
        for i in 0..50 {
            let id = i.to_string();
            table = table.with_row([Some(id.as_str())]);
        }
        let source = MemorySource::new("gotest").with_table(table).with_row_buffer(4);
        let rows = collect(source.query_rows("t", &["id".to_string()])).await;
        assert_eq!(rows.len(), 50);
        assert!(rows.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_injected_row_failure() {
        let source = MemorySource::new("gotest").with_table(
            MemoryTable::new("t", &["id"])
                .with_row([Some("1")])
                .with_row([Some("2")])
                .fail_rows_after(1, QueryErrorKind::Other, "lost"),
        );
        let rows = collect(source.query_rows("t", &["id".to_string()])).await;
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_ok());
        assert!(rows[1].is_err());
    }

    #[tokio::test]
    async fn test_unreachable_source() {
        let source = MemorySource::new("gotest").unreachable("connection refused");
        assert!(matches!(
            source.list_tables().await,
            Err(DumpError::Connection(_))
        ));
        assert!(source.test_connection().await.is_err());
    }
}
