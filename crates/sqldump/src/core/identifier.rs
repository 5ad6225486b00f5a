//! Identifier validation and quoting.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! metadata query and every emitted statement interpolates them. All such
//! interpolation goes through [`quote_mysql`], which validates the name first
//! and then applies backtick quoting with embedded backticks doubled.

use crate::error::{DumpError, QueryErrorKind, Result};

/// Maximum identifier length accepted (MySQL allows 64 characters; leave
/// headroom for multi-byte names).
const MAX_IDENTIFIER_LENGTH: usize = 256;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers exceeding [`MAX_IDENTIFIER_LENGTH`] bytes.
///
/// # Errors
///
/// Returns a `Malformed` query error, since any statement built from the name
/// would be rejected by the server anyway.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DumpError::query(
            QueryErrorKind::Malformed,
            "Identifier cannot be empty",
        ));
    }

    if name.contains('\0') {
        return Err(DumpError::query(
            QueryErrorKind::Malformed,
            format!("Identifier contains null byte: {:?}", name),
        ));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DumpError::query(
            QueryErrorKind::Malformed,
            format!(
                "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
                MAX_IDENTIFIER_LENGTH,
                name.len(),
                name
            ),
        ));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// ```
/// use sqldump::core::identifier::quote_mysql;
///
/// assert_eq!(quote_mysql("users").unwrap(), "`users`");
/// assert_eq!(quote_mysql("table`name").unwrap(), "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a list of column names and join them with `, `.
pub fn quote_column_list(columns: &[String]) -> Result<String> {
    let quoted = columns
        .iter()
        .map(|c| quote_mysql(c))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}
