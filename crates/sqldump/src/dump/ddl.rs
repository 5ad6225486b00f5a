//! Table structure blocks.

use tokio::io::AsyncWrite;

use super::emit;
use crate::core::identifier::quote_mysql;
use crate::core::traits::DataSource;
use crate::error::Result;

/// Fetch the server's `CREATE` statement for `table`.
pub async fn get_create_statement(source: &dyn DataSource, table: &str) -> Result<String> {
    source
        .get_create_statement(table)
        .await
        .map_err(|e| e.for_table(table))
}

/// Render the comment banner, `DROP TABLE IF EXISTS` and definition of a table.
///
/// The definition is copied verbatim apart from trailing whitespace and
/// semicolons, so the block always ends in exactly one `;\n`.
pub fn structure_block(table: &str, ddl: &str) -> Result<String> {
    let quoted = quote_mysql(table)?;
    let definition = ddl.trim_end().trim_end_matches(';').trim_end();
    Ok(format!(
        "\n--\n-- Structure for table {quoted}\n--\n\nDROP TABLE IF EXISTS {quoted};\n{definition};\n"
    ))
}

/// Write the structure block for `table` to the sink.
pub async fn write_structure<W>(sink: &mut W, table: &str, ddl: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    emit(sink, structure_block(table, ddl)?.as_bytes()).await
}

/// `\n--\n-- Data for table `t`\n`
pub fn data_header(table: &str) -> Result<String> {
    Ok(format!("\n--\n-- Data for table {}\n", quote_mysql(table)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{MemorySource, MemoryTable};
    use crate::error::QueryErrorKind;

    const CREATE_TABLE: &str = "CREATE TABLE `test` (\n  `id` int(11) unsigned NOT NULL AUTO_INCREMENT,\n  `test` varchar(255) DEFAULT NULL,\n  `name` varchar(255) DEFAULT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=MyISAM DEFAULT CHARSET=utf8";

    #[test]
    fn test_structure_block() {
        assert_eq!(
            structure_block("test", CREATE_TABLE).unwrap(),
            format!(
                "\n--\n-- Structure for table `test`\n--\n\nDROP TABLE IF EXISTS `test`;\n{};\n",
                CREATE_TABLE
            )
        );
    }

    #[test]
    fn test_structure_block_does_not_double_terminator() {
        let block = structure_block("test", &format!("{};\n", CREATE_TABLE)).unwrap();
        assert!(block.ends_with("CHARSET=utf8;\n"));
    }

    #[test]
    fn test_data_header() {
        assert_eq!(data_header("test").unwrap(), "\n--\n-- Data for table `test`\n");
    }

    #[tokio::test]
    async fn test_write_structure() {
        let mut out: Vec<u8> = Vec::new();
        write_structure(&mut out, "a`b", "CREATE TABLE `a``b` (x int)")
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("DROP TABLE IF EXISTS `a``b`;\n"));
    }

    #[tokio::test]
    async fn test_get_create_statement_is_verbatim() {
        let source = MemorySource::new("gotest")
            .with_table(MemoryTable::new("test", &["id"]).with_create_statement(CREATE_TABLE));
        assert_eq!(
            get_create_statement(&source, "test").await.unwrap(),
            CREATE_TABLE
        );
    }

    #[tokio::test]
    async fn test_get_create_statement_missing_table() {
        let source = MemorySource::new("gotest");
        let err = get_create_statement(&source, "nope").await.unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::NotFound));
    }
}
