//! MySQL/MariaDB database driver.
//!
//! - [`MysqlSource`]: the [`DataSource`](crate::core::DataSource)
//!   implementation backed by an SQLx pool
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod source;

pub use source::{build_select_query, kind_for_error_number, MysqlSource};
