//! Run outcome reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DumpError, Result};

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpStatus {
    /// Every table was dumped.
    Completed,
    /// The run finished but at least one table failed.
    CompletedWithErrors,
    /// The run was stopped between tables.
    Cancelled,
}

impl std::fmt::Display for DumpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DumpStatus::Completed => "completed",
            DumpStatus::CompletedWithErrors => "completed_with_errors",
            DumpStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOutcome {
    pub table: String,

    /// Rows written, including those of a table that failed mid-stream.
    pub rows: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Classification of the failure (`not_found`, `permission_denied`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl TableOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a dump run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Database that was dumped.
    pub database: String,

    /// Final status.
    pub status: DumpStatus,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables attempted.
    pub tables_total: usize,

    /// Tables dumped without error.
    pub tables_success: usize,

    /// Tables that failed.
    pub tables_failed: usize,

    /// Rows written across all tables.
    pub rows_dumped: u64,

    /// Per-table outcomes in dump order.
    pub tables: Vec<TableOutcome>,
}

impl DumpReport {
    pub(crate) fn start(database: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            database: database.to_string(),
            status: DumpStatus::Completed,
            started_at: now,
            completed_at: now,
            duration_seconds: 0.0,
            tables_total: 0,
            tables_success: 0,
            tables_failed: 0,
            rows_dumped: 0,
            tables: Vec::new(),
        }
    }

    pub(crate) fn record_success(&mut self, table: &str, rows: u64) {
        self.tables_total += 1;
        self.tables_success += 1;
        self.rows_dumped += rows;
        self.tables.push(TableOutcome {
            table: table.to_string(),
            rows,
            error: None,
            error_kind: None,
        });
    }

    pub(crate) fn record_failure(&mut self, table: &str, rows: u64, error: &DumpError) {
        self.tables_total += 1;
        self.tables_failed += 1;
        self.rows_dumped += rows;
        self.tables.push(TableOutcome {
            table: table.to_string(),
            rows,
            error: Some(error.to_string()),
            error_kind: error.query_kind().map(|k| k.as_str().to_string()),
        });
    }

    pub(crate) fn finish(mut self, cancelled: bool) -> Self {
        self.completed_at = Utc::now();
        self.duration_seconds =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.status = if cancelled {
            DumpStatus::Cancelled
        } else if self.tables_failed > 0 {
            DumpStatus::CompletedWithErrors
        } else {
            DumpStatus::Completed
        };
        self
    }

    /// Names of tables dumped without error.
    pub fn succeeded_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.is_success())
            .map(|t| t.table.as_str())
            .collect()
    }

    /// `(table, error)` pairs for failed tables.
    pub fn failed_tables(&self) -> Vec<(&str, &str)> {
        self.tables
            .iter()
            .filter_map(|t| t.error.as_deref().map(|e| (t.table.as_str(), e)))
            .collect()
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            DumpStatus::Completed => 0,
            DumpStatus::CompletedWithErrors => 5,
            DumpStatus::Cancelled => 130,
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryErrorKind;

    #[test]
    fn test_totals_and_status() {
        let mut report = DumpReport::start("gotest");
        report.record_success("a", 2);
        report.record_failure(
            "b",
            0,
            &DumpError::not_found("b", "Table 'gotest.b' doesn't exist"),
        );
        let report = report.finish(false);

        assert_eq!(report.status, DumpStatus::CompletedWithErrors);
        assert_eq!(report.tables_total, 2);
        assert_eq!(report.tables_success, 1);
        assert_eq!(report.tables_failed, 1);
        assert_eq!(report.rows_dumped, 2);
        assert_eq!(report.succeeded_tables(), vec!["a"]);
        assert_eq!(report.failed_tables()[0].0, "b");
        assert_eq!(report.tables[1].error_kind.as_deref(), Some("not_found"));
        assert_eq!(report.exit_code(), 5);
    }

    #[test]
    fn test_partial_rows_of_failed_table_are_counted() {
        let mut report = DumpReport::start("gotest");
        report.record_success("a", 2);
        report.record_failure("b", 3, &DumpError::query(QueryErrorKind::Other, "lost"));
        let report = report.finish(false);

        assert_eq!(report.rows_dumped, 5);
        assert_eq!(report.tables[1].rows, 3);
        assert!(!report.tables[1].is_success());
    }

    #[test]
    fn test_cancelled_wins_over_failures() {
        let mut report = DumpReport::start("gotest");
        report.record_failure("a", 3, &DumpError::query(QueryErrorKind::Other, "x"));
        assert_eq!(report.finish(true).status, DumpStatus::Cancelled);
    }

    #[test]
    fn test_to_json() {
        let mut report = DumpReport::start("gotest");
        report.record_success("test", 2);
        let json = report.finish(false).to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["database"], "gotest");
        assert_eq!(value["tables"][0]["rows"], 2);
        assert!(value["tables"][0].get("error").is_none());
    }
}
