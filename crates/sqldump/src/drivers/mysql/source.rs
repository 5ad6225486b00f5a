//! MySQL/MariaDB data source implementation.
//!
//! Implements the `DataSource` trait for dumping MySQL/MariaDB databases.
//! Uses SQLx for connection pooling and async query execution.
//!
//! All statements are sent as plain `&str` executions, which SQLx runs over
//! the text protocol. Field values therefore arrive as the server's textual
//! bytes, exactly what a dump needs to write back out.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{
    MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode,
};
use sqlx::{Executor, Row as _};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::{DumpConfig, SourceConfig};
use crate::core::identifier::{quote_column_list, quote_mysql};
use crate::core::schema::{ColumnList, TableDescriptor, TableKind};
use crate::core::traits::DataSource;
use crate::core::value::Row;
use crate::error::{DumpError, QueryErrorKind, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// MySQL/MariaDB data source.
pub struct MysqlSource {
    pool: MySqlPool,
    database: String,
    row_buffer: usize,
}

impl MysqlSource {
    /// Connect to the source database described by `config`.
    pub async fn new(config: &SourceConfig, dump: &DumpConfig) -> Result<Self> {
        let options = connect_options(config, dump)?;

        let pool = MySqlPoolOptions::new()
            .max_connections(dump.max_connections as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| {
                DumpError::Connection(format!("connecting to {}: {}", config.display_url(), e))
            })?;

        let source = Self {
            pool,
            database: config.database.clone(),
            row_buffer: dump.row_buffer.max(1),
        };
        source.test_connection().await?;

        info!(
            "Connected to MySQL source: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(source)
    }

    /// Read the text value of a metadata column.
    ///
    /// `INFORMATION_SCHEMA` and `SHOW` results may come back as VARBINARY
    /// depending on server collation, so decode the raw bytes directly.
    fn text_column(row: &MySqlRow, idx: usize, context: &str) -> Result<String> {
        let bytes: Option<Vec<u8>> = row
            .try_get_unchecked(idx)
            .map_err(|e| classify(e, context))?;
        Ok(bytes
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default())
    }

    /// Convert a text-protocol row into raw values.
    fn raw_row(row: &MySqlRow, width: usize) -> Result<Row> {
        if row.len() != width {
            return Err(DumpError::query(
                QueryErrorKind::Other,
                format!("expected {} columns, server returned {}", width, row.len()),
            ));
        }

        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            let value: Option<Vec<u8>> = row
                .try_get_unchecked(idx)
                .map_err(|e| classify(e, "decoding row"))?;
            values.push(value);
        }
        Ok(Row::new(values))
    }

    async fn stream_rows(
        pool: MySqlPool,
        sql: &str,
        width: usize,
        tx: &mpsc::Sender<Result<Row>>,
    ) -> Result<u64> {
        let mut rows = (&pool).fetch(sql);
        let mut count: u64 = 0;

        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| classify(e, "reading rows"))?
        {
            let row = Self::raw_row(&row, width)?;
            if tx.send(Ok(row)).await.is_err() {
                debug!("Row receiver dropped after {} rows", count);
                break;
            }
            count += 1;
        }

        Ok(count)
    }
}

#[async_trait]
impl DataSource for MysqlSource {
    async fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        let rows: Vec<MySqlRow> = (&self.pool)
            .fetch_all("SHOW FULL TABLES")
            .await
            .map_err(|e| classify(e, "listing tables"))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = Self::text_column(row, 0, "listing tables")?;
            let table_type = Self::text_column(row, 1, "listing tables")?;
            tables.push(TableDescriptor {
                name,
                kind: TableKind::from_server_type(&table_type),
            });
        }

        debug!(
            "SHOW FULL TABLES returned {} relations in '{}'",
            tables.len(),
            self.database
        );
        Ok(tables)
    }

    async fn list_columns(&self, table: &str) -> Result<ColumnList> {
        let sql = format!("SHOW COLUMNS FROM {}", quote_mysql(table)?);
        let rows: Vec<MySqlRow> = (&self.pool)
            .fetch_all(sql.as_str())
            .await
            .map_err(|e| classify(e, "listing columns").for_table(table))?;

        let columns = rows
            .iter()
            .map(|row| Self::text_column(row, 0, "listing columns"))
            .collect::<Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(DumpError::not_found(table, "table has no columns"));
        }
        Ok(columns)
    }

    async fn get_create_statement(&self, table: &str) -> Result<String> {
        let sql = format!("SHOW CREATE TABLE {}", quote_mysql(table)?);
        let row: MySqlRow = (&self.pool)
            .fetch_one(sql.as_str())
            .await
            .map_err(|e| classify(e, "reading table definition").for_table(table))?;

        Self::text_column(&row, 1, "reading table definition")
    }

    fn query_rows(&self, table: &str, columns: &[String]) -> mpsc::Receiver<Result<Row>> {
        let (tx, rx) = mpsc::channel(self.row_buffer);
        let pool = self.pool.clone();
        let table = table.to_string();
        let sql = build_select_query(&table, columns);
        let width = columns.len();

        tokio::spawn(async move {
            let result = match sql {
                Ok(sql) => {
                    debug!("{}", sql);
                    Self::stream_rows(pool, &sql, width, &tx).await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(count) => debug!("Read {} rows from `{}`", count, table),
                Err(e) => {
                    let _ = tx.send(Err(e.for_table(&table))).await;
                }
            }
        });

        rx
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DumpError::Connection(format!("testing MySQL connection: {}", e)))?;
        Ok(())
    }

    fn database(&self) -> &str {
        &self.database
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Build the row query for a table with an explicit column list.
///
/// Selecting named columns rather than `*` pins value order to the column
/// clause of the emitted `INSERT`.
pub fn build_select_query(table: &str, columns: &[String]) -> Result<String> {
    if columns.is_empty() {
        return Err(DumpError::not_found(table, "table has no columns"));
    }
    Ok(format!(
        "SELECT {} FROM {}",
        quote_column_list(columns)?,
        quote_mysql(table)?
    ))
}

/// Session options for the pool.
///
/// The session character set is the one announced by `SET NAMES` in the
/// script, so the bytes read are the bytes the replay expects.
fn connect_options(config: &SourceConfig, dump: &DumpConfig) -> Result<MySqlConnectOptions> {
    Ok(MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
        .charset(&dump.charset)
        .ssl_mode(ssl_mode(&config.ssl_mode)?))
}

fn ssl_mode(mode: &str) -> Result<MySqlSslMode> {
    match mode.to_lowercase().as_str() {
        "disabled" => Ok(MySqlSslMode::Disabled),
        "preferred" => Ok(MySqlSslMode::Preferred),
        "required" => Ok(MySqlSslMode::Required),
        other => Err(DumpError::Config(format!("Unknown ssl_mode: '{}'", other))),
    }
}

/// Map a MySQL server error number onto an engine-agnostic kind.
pub fn kind_for_error_number(number: u16) -> QueryErrorKind {
    match number {
        // ER_NO_SUCH_TABLE, ER_BAD_DB_ERROR, ER_BAD_FIELD_ERROR, ER_BAD_TABLE_ERROR,
        // ER_UNKNOWN_TABLE
        1146 | 1049 | 1054 | 1051 | 1109 => QueryErrorKind::NotFound,
        // ER_DBACCESS_DENIED_ERROR, ER_ACCESS_DENIED_ERROR, ER_TABLEACCESS_DENIED_ERROR,
        // ER_COLUMNACCESS_DENIED_ERROR, ER_SPECIFIC_ACCESS_DENIED_ERROR
        1044 | 1045 | 1142 | 1143 | 1227 => QueryErrorKind::PermissionDenied,
        // ER_PARSE_ERROR, ER_SYNTAX_ERROR
        1064 | 1149 => QueryErrorKind::Malformed,
        _ => QueryErrorKind::Other,
    }
}

/// Classify an SQLx error as a connection or query failure.
fn classify(err: sqlx::Error, context: &str) -> DumpError {
    match err {
        sqlx::Error::Database(db_err) => {
            let kind = db_err
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| kind_for_error_number(e.number()))
                .unwrap_or(QueryErrorKind::Other);
            DumpError::query(kind, format!("{}: {}", context, db_err))
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DumpError::Connection(format!("{}: {}", context, err)),
        other => DumpError::query(QueryErrorKind::Other, format!("{}: {}", context, other)),
    }
}
