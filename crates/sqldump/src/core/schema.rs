//! Table metadata types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of relation reported by the server's table listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// A physical, storage-backed table.
    BaseTable,
    /// Views, system views, sequences and anything else that is not dumpable.
    Other(String),
}

impl TableKind {
    /// Parse the table type string reported by the server
    /// (`SHOW FULL TABLES` / `INFORMATION_SCHEMA.TABLES.TABLE_TYPE`).
    pub fn from_server_type(table_type: &str) -> Self {
        if table_type.trim().eq_ignore_ascii_case("BASE TABLE") {
            TableKind::BaseTable
        } else {
            TableKind::Other(table_type.trim().to_string())
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::BaseTable => f.write_str("BASE TABLE"),
            TableKind::Other(kind) => f.write_str(kind),
        }
    }
}

/// A relation discovered in the source database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name, unquoted.
    pub name: String,
    /// Relation kind.
    pub kind: TableKind,
}

impl TableDescriptor {
    /// Descriptor for a base table.
    pub fn base_table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::BaseTable,
        }
    }

    /// Descriptor for a view.
    pub fn view(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::Other("VIEW".to_string()),
        }
    }

    /// Whether rows and structure of this relation are dumped.
    pub fn is_dumpable(&self) -> bool {
        self.kind == TableKind::BaseTable
    }
}

/// Column names of one table in the server's native order.
pub type ColumnList = Vec<String>;
