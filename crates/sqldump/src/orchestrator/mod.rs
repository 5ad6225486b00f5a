//! Dump orchestrator - whole-database workflow coordinator.

mod report;

pub use report::{DumpReport, DumpStatus, TableOutcome};

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, DumpConfig};
use crate::core::schema::TableDescriptor;
use crate::core::traits::DataSource;
use crate::dump::{emit, flush, DumpUnitBuilder, SchemaInspector, TableDumpError};
use crate::error::{DumpError, Result};

/// Dump orchestrator.
///
/// Owns the data source and the dump options; the output sink is passed to
/// each run explicitly.
pub struct Orchestrator {
    source: Arc<dyn DataSource>,
    options: DumpConfig,
    cancel: CancellationToken,
}

/// Result of a health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub database: String,
    pub db_type: String,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Orchestrator {
    /// Create an orchestrator over an already opened data source.
    pub fn new(source: Arc<dyn DataSource>, options: DumpConfig) -> Self {
        Self {
            source,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Open the configured data source and wrap it.
    pub async fn connect(config: Config) -> Result<Self> {
        let source = crate::drivers::connect(&config).await?;
        Ok(Self::new(source, config.dump))
    }

    /// Stop starting new tables once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Tables a full dump would cover, after exclusions.
    pub async fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        let tables = SchemaInspector::new(self.source.as_ref())
            .list_tables()
            .await?;
        Ok(tables
            .into_iter()
            .filter(|t| {
                let excluded = self.options.is_excluded(&t.name);
                if excluded {
                    debug!("Excluding table `{}`", t.name);
                }
                !excluded
            })
            .collect())
    }

    /// Dump every base table of the database.
    ///
    /// Query failures are recorded per table and the run moves on.
    /// Connection and sink failures stop the run and are returned.
    pub async fn dump_all<W>(&self, sink: &mut W) -> Result<DumpReport>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let database = self.source.database().to_string();
        let mut report = DumpReport::start(&database);
        info!("Starting dump run {} of '{}'", report.run_id, database);

        // Discovery comes first so a failure leaves the sink untouched
        let tables = match self.list_tables().await {
            Ok(tables) => tables,
            Err(e) => {
                error!("Table discovery failed: {}", e);
                return Err(e);
            }
        };
        info!("Dumping {} tables", tables.len());

        emit(sink, self.preamble().as_bytes()).await?;

        let unit = DumpUnitBuilder::new(self.source.as_ref());
        let mut cancelled = false;

        for table in &tables {
            if self.cancel.is_cancelled() {
                warn!("Dump cancelled before table `{}`", table.name);
                cancelled = true;
                break;
            }

            match unit.dump_table(sink, &table.name).await {
                Ok(rows) => {
                    info!("{}: dumped {} rows", table.name, rows);
                    report.record_success(&table.name, rows);
                }
                Err(TableDumpError {
                    error: e @ DumpError::Sink(_),
                    ..
                }) => {
                    error!("{}: output failed - {}", table.name, e);
                    return Err(e);
                }
                Err(TableDumpError { error: e, .. }) if e.is_fatal() => {
                    error!("{}: {}", table.name, e);
                    // Keep the script replayable up to this point
                    if let Err(post) = self.write_postamble(sink).await {
                        debug!("Could not write postamble after failure: {}", post);
                    }
                    return Err(e);
                }
                Err(TableDumpError { error: e, rows }) => {
                    warn!("{}: failed after {} rows - {}", table.name, rows, e);
                    report.record_failure(&table.name, rows, &e);
                }
            }
        }

        self.write_postamble(sink).await?;

        let report = report.finish(cancelled);
        info!(
            "Dump {}: {} tables ({} failed), {} rows in {:.1}s",
            report.status,
            report.tables_total,
            report.tables_failed,
            report.rows_dumped,
            report.duration_seconds
        );
        Ok(report)
    }

    /// Dump one known table: no discovery, no preamble or postamble.
    ///
    /// Any failure, including a query failure, is returned as an error.
    pub async fn dump_table<W>(&self, sink: &mut W, table: &str) -> Result<DumpReport>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let mut report = DumpReport::start(self.source.database());
        info!("Dumping single table `{}`", table);

        let rows = DumpUnitBuilder::new(self.source.as_ref())
            .dump_table(sink, table)
            .await
            .map_err(|f| f.error)?;
        flush(sink).await?;

        report.record_success(table, rows);
        Ok(report.finish(false))
    }

    /// Check connectivity to the data source.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let result = self.source.test_connection().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        HealthCheckResult {
            healthy: result.is_ok(),
            database: self.source.database().to_string(),
            db_type: self.source.db_type().to_string(),
            latency_ms,
            error: result.err().map(|e| e.to_string()),
        }
    }

    /// Release the data source.
    pub async fn close(&self) {
        self.source.close().await;
    }

    fn preamble(&self) -> String {
        let mut out = format!(
            "-- sqldump {}\n-- Database: `{}`\n\nSET NAMES {};\n",
            env!("CARGO_PKG_VERSION"),
            self.source.database().replace('`', "``"),
            self.options.charset
        );
        if self.options.disable_foreign_key_checks {
            out.push_str("SET FOREIGN_KEY_CHECKS = 0;\n");
        }
        out
    }

    fn postamble(&self) -> String {
        let mut out = String::from("\nUNLOCK TABLES;\n");
        if self.options.disable_foreign_key_checks {
            out.push_str("SET FOREIGN_KEY_CHECKS = 1;\n");
        }
        out
    }

    async fn write_postamble<W>(&self, sink: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        emit(sink, self.postamble().as_bytes()).await?;
        flush(sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{MemorySource, MemoryTable};
    use crate::error::QueryErrorKind;

    fn orchestrator(source: MemorySource) -> Orchestrator {
        Orchestrator::new(Arc::new(source), DumpConfig::default())
    }

    #[test]
    fn test_preamble_and_postamble() {
        let orch = orchestrator(MemorySource::new("gotest"));
        assert_eq!(
            orch.preamble(),
            format!(
                "-- sqldump {}\n-- Database: `gotest`\n\nSET NAMES utf8;\nSET FOREIGN_KEY_CHECKS = 0;\n",
                env!("CARGO_PKG_VERSION")
            )
        );
        assert_eq!(
            orch.postamble(),
            "\nUNLOCK TABLES;\nSET FOREIGN_KEY_CHECKS = 1;\n"
        );
    }

    #[test]
    fn test_fk_relaxation_can_be_turned_off() {
        let options = DumpConfig {
            disable_foreign_key_checks: false,
            charset: "utf8mb4".to_string(),
            ..DumpConfig::default()
        };
        let orch = Orchestrator::new(Arc::new(MemorySource::new("gotest")), options);
        assert!(orch.preamble().ends_with("SET NAMES utf8mb4;\n"));
        assert_eq!(orch.postamble(), "\nUNLOCK TABLES;\n");
    }

    #[tokio::test]
    async fn test_exclusions() {
        let options = DumpConfig {
            exclude_tables: vec!["audit".to_string()],
            ..DumpConfig::default()
        };
        let source = MemorySource::new("gotest")
            .with_table(MemoryTable::new("audit", &["id"]))
            .with_table(MemoryTable::new("test", &["id"]));
        let orch = Orchestrator::new(Arc::new(source), options);

        let names: Vec<String> = orch
            .list_tables()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["test"]);
    }

    #[tokio::test]
    async fn test_health_check() {
        let healthy = orchestrator(MemorySource::new("gotest")).health_check().await;
        assert!(healthy.healthy);
        assert_eq!(healthy.db_type, "memory");

        let down = orchestrator(MemorySource::new("gotest").unreachable("refused"))
            .health_check()
            .await;
        assert!(!down.healthy);
        assert!(down.error.unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn test_dump_table_single_mode_has_no_preamble() {
        let source = MemorySource::new("gotest")
            .with_table(MemoryTable::new("test", &["id"]).with_row([Some("1")]));
        let mut out: Vec<u8> = Vec::new();
        let report = orchestrator(source)
            .dump_table(&mut out, "test")
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\n--\n-- Structure for table `test`"));
        assert!(!text.contains("SET NAMES"));
        assert!(!text.contains("UNLOCK TABLES"));
        assert_eq!(report.rows_dumped, 1);
    }

    #[tokio::test]
    async fn test_dump_table_missing_is_error() {
        let mut out: Vec<u8> = Vec::new();
        let err = orchestrator(MemorySource::new("gotest"))
            .dump_table(&mut out, "test")
            .await
            .unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_table() {
        let source = MemorySource::new("gotest").with_table(MemoryTable::new("test", &["id"]));
        let token = CancellationToken::new();
        token.cancel();
        let orch = orchestrator(source).with_cancellation(token);

        let mut out: Vec<u8> = Vec::new();
        let report = orch.dump_all(&mut out).await.unwrap();

        assert_eq!(report.status, DumpStatus::Cancelled);
        assert_eq!(report.tables_total, 0);
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("Structure for table"));
        assert!(text.ends_with("\nUNLOCK TABLES;\nSET FOREIGN_KEY_CHECKS = 1;\n"));
    }
}
