//! Error types for the dump engine.

use std::fmt;

use thiserror::Error;

/// Engine-agnostic classification of a failed query.
///
/// Drivers map their server-specific error codes onto these kinds so callers
/// never have to match on error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// The table, column or database does not exist.
    NotFound,
    /// The account lacks the privilege needed for the query.
    PermissionDenied,
    /// The statement was rejected by the parser.
    Malformed,
    /// Any other server-side failure.
    Other,
}

impl QueryErrorKind {
    /// Short, stable name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryErrorKind::NotFound => "not_found",
            QueryErrorKind::PermissionDenied => "permission_denied",
            QueryErrorKind::Malformed => "malformed",
            QueryErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for dump operations.
#[derive(Error, Debug)]
pub enum DumpError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The data source cannot be reached or refused authentication.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A specific query failed.
    #[error("Query error ({kind}){}: {message}", table_suffix(.table))]
    Query {
        table: Option<String>,
        kind: QueryErrorKind,
        message: String,
    },

    /// Writing to the output sink failed.
    #[error("Output error: {0}")]
    Sink(#[source] std::io::Error),

    /// IO error (config file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Dump was cancelled (SIGINT, etc.)
    #[error("Dump cancelled")]
    Cancelled,
}

fn table_suffix(table: &Option<String>) -> String {
    match table {
        Some(t) => format!(" on table `{}`", t),
        None => String::new(),
    }
}

impl DumpError {
    /// Create a Query error that is not tied to a table yet.
    pub fn query(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        DumpError::Query {
            table: None,
            kind,
            message: message.into(),
        }
    }

    /// Create a NotFound Query error for a table.
    pub fn not_found(table: impl Into<String>, message: impl Into<String>) -> Self {
        DumpError::Query {
            table: Some(table.into()),
            kind: QueryErrorKind::NotFound,
            message: message.into(),
        }
    }

    /// Attach a table name to a Query error that does not carry one yet.
    pub fn for_table(self, name: &str) -> Self {
        match self {
            DumpError::Query {
                table: None,
                kind,
                message,
            } => DumpError::Query {
                table: Some(name.to_string()),
                kind,
                message,
            },
            other => other,
        }
    }

    /// Query classification, if this is a Query error.
    pub fn query_kind(&self) -> Option<QueryErrorKind> {
        match self {
            DumpError::Query { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether this error must abort a whole-database run.
    ///
    /// Only Query errors are table-scoped; everything else stops the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DumpError::Query { .. })
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            DumpError::Config(_) | DumpError::Yaml(_) | DumpError::Io(_) => 1,
            DumpError::Connection(_) => 2,
            DumpError::Query { .. } => 3,
            DumpError::Sink(_) | DumpError::Json(_) => 4,
            DumpError::Cancelled => 130,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for dump operations.
pub type Result<T> = std::result::Result<T, DumpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_message_names_table_and_kind() {
        let err = DumpError::not_found("test", "Table 'gotest.test' doesn't exist");
        assert_eq!(
            err.to_string(),
            "Query error (not_found) on table `test`: Table 'gotest.test' doesn't exist"
        );
        assert_eq!(err.query_kind(), Some(QueryErrorKind::NotFound));
    }

    #[test]
    fn test_for_table_keeps_existing_table() {
        let err = DumpError::not_found("a", "gone").for_table("b");
        assert!(matches!(err, DumpError::Query { table: Some(ref t), .. } if t == "a"));

        let err = DumpError::query(QueryErrorKind::Malformed, "bad").for_table("b");
        assert!(matches!(err, DumpError::Query { table: Some(ref t), .. } if t == "b"));
    }

    #[test]
    fn test_fatality() {
        assert!(!DumpError::query(QueryErrorKind::Other, "x").is_fatal());
        assert!(DumpError::Connection("refused".into()).is_fatal());
        assert!(DumpError::Sink(std::io::Error::other("disk full")).is_fatal());
    }

    #[test]
    fn test_exit_codes_are_distinct_for_connection_and_query() {
        assert_eq!(DumpError::Connection("x".into()).exit_code(), 2);
        assert_eq!(DumpError::query(QueryErrorKind::NotFound, "x").exit_code(), 3);
        assert_eq!(DumpError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_format_detailed_includes_source() {
        let err = DumpError::Sink(std::io::Error::other("broken pipe"));
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Output error: broken pipe"));
        assert!(detailed.contains("Caused by:"));
    }
}
