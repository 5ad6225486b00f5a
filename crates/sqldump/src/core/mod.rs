//! Core abstractions shared by the drivers and the dump engine.
//!
//! - [`schema`]: table descriptors and column lists
//! - [`value`]: raw, unescaped row values
//! - [`traits`]: the [`DataSource`] capability every driver implements
//! - [`identifier`]: identifier validation and backtick quoting

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{ColumnList, TableDescriptor, TableKind};
pub use traits::{DataSource, DEFAULT_ROW_BUFFER};
pub use value::{RawValue, Row};
