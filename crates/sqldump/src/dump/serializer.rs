//! Row serialization: value escaping, tuples and the streamed `INSERT` batch.
//!
//! The escaping table is fixed and byte-exact so dumps stay compatible with
//! scripts produced by earlier versions:
//!
//! | byte            | written as |
//! |-----------------|------------|
//! | `0x00`          | `\0`       |
//! | `\n`            | `\n`       |
//! | `\r`            | `\r`       |
//! | `\`             | `\\`       |
//! | `'`             | `\'`       |
//! | `"`             | `\"`       |
//! | `0x1A`          | `\Z`       |
//!
//! Every other byte, including each byte of a multi-byte UTF-8 sequence and
//! arbitrary binary, is copied through unchanged.

use tokio::io::AsyncWrite;
use tracing::debug;

use super::emit;
use crate::core::identifier::{quote_column_list, quote_mysql};
use crate::core::value::Row;
use crate::error::{DumpError, QueryErrorKind, Result};

/// Marker written in place of an `INSERT` for a table without rows.
pub const EMPTY_TABLE_MARKER: &str = "\n--Empty table\n";

/// Escape one raw value into `out`, without surrounding quotes.
pub fn escape_into(raw: &[u8], out: &mut Vec<u8>) {
    out.reserve(raw.len());
    for &b in raw {
        match b {
            0x00 => out.extend_from_slice(b"\\0"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'"' => out.extend_from_slice(b"\\\""),
            0x1a => out.extend_from_slice(b"\\Z"),
            _ => out.push(b),
        }
    }
}

/// Serialize one field: `NULL` for null, otherwise a quoted, escaped literal.
///
/// ```
/// use sqldump::dump::serializer::serialize_value;
///
/// assert_eq!(serialize_value(None), b"NULL");
/// assert_eq!(serialize_value(Some(b"it's")), b"'it\\'s'");
/// ```
pub fn serialize_value(raw: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(raw, &mut out);
    out
}

fn write_value(raw: Option<&[u8]>, out: &mut Vec<u8>) {
    match raw {
        None => out.extend_from_slice(b"NULL"),
        Some(bytes) => {
            out.push(b'\'');
            escape_into(bytes, out);
            out.push(b'\'');
        }
    }
}

/// Serialize a row as `( v1, v2, ..., vn )`.
pub fn serialize_row(row: &Row) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 * row.len() + 4);
    out.extend_from_slice(b"( ");
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(b", ");
        }
        write_value(value, &mut out);
    }
    out.extend_from_slice(b" )");
    out
}

/// `INSERT INTO `t` (`c1`, `c2`)\nVALUES\n`
pub fn insert_header(table: &str, columns: &[String]) -> Result<String> {
    Ok(format!(
        "INSERT INTO {} ({})\nVALUES\n",
        quote_mysql(table)?,
        quote_column_list(columns)?
    ))
}

/// `LOCK TABLES `t` WRITE;\n`
pub fn lock_statement(table: &str) -> Result<String> {
    Ok(format!("LOCK TABLES {} WRITE;\n", quote_mysql(table)?))
}

/// The single pending slot of the batch writer.
#[derive(Debug)]
enum Pending {
    /// No tuple seen yet.
    Empty,
    /// The last tuple read, not yet written.
    Holding(Vec<u8>),
}

/// Streams the rows of one table into a single `INSERT` batch.
///
/// Holds at most one serialized tuple between writes. The first tuple triggers
/// the `LOCK TABLES` and `INSERT` header; each following tuple flushes the
/// held one with `,\n`; [`finish`](Self::finish) terminates the held tuple
/// with `;\n`, or writes the empty-table marker when no tuple ever arrived.
pub struct RowBatchWriter<'w, W: ?Sized> {
    sink: &'w mut W,
    table: String,
    width: usize,
    header: String,
    pending: Pending,
    rows: u64,
}

impl<'w, W> RowBatchWriter<'w, W>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    /// Prepare a batch for `table` with the given column clause.
    pub fn new(sink: &'w mut W, table: &str, columns: &[String]) -> Result<Self> {
        let header = format!(
            "{}{}",
            lock_statement(table)?,
            insert_header(table, columns)?
        );
        Ok(Self {
            sink,
            table: table.to_string(),
            width: columns.len(),
            header,
            pending: Pending::Empty,
            rows: 0,
        })
    }

    /// Number of tuples accepted so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Accept the next row.
    pub async fn push(&mut self, row: &Row) -> Result<()> {
        if row.len() != self.width {
            return Err(DumpError::Query {
                table: Some(self.table.clone()),
                kind: QueryErrorKind::Other,
                message: format!(
                    "row has {} fields, column list has {}",
                    row.len(),
                    self.width
                ),
            });
        }

        let tuple = serialize_row(row);
        match std::mem::replace(&mut self.pending, Pending::Holding(tuple)) {
            Pending::Empty => {
                emit(self.sink, self.header.as_bytes()).await?;
            }
            Pending::Holding(mut previous) => {
                previous.extend_from_slice(b",\n");
                emit(self.sink, &previous).await?;
            }
        }
        self.rows += 1;
        Ok(())
    }

    /// Terminate the batch and return the number of rows written.
    pub async fn finish(mut self) -> Result<u64> {
        match std::mem::replace(&mut self.pending, Pending::Empty) {
            Pending::Holding(mut last) => {
                last.extend_from_slice(b";\n");
                emit(self.sink, &last).await?;
            }
            Pending::Empty => {
                emit(self.sink, EMPTY_TABLE_MARKER.as_bytes()).await?;
            }
        }
        debug!("`{}`: wrote {} rows", self.table, self.rows);
        Ok(self.rows)
    }

    /// Close the batch after a failed row stream.
    ///
    /// A held tuple is terminated so the rows already written still form a
    /// valid statement, then a comment records why the table is incomplete.
    pub async fn abort(mut self, reason: &str) -> Result<u64> {
        if let Pending::Holding(mut last) = std::mem::replace(&mut self.pending, Pending::Empty) {
            last.extend_from_slice(b";\n");
            emit(self.sink, &last).await?;
        }
        let comment = format!(
            "-- Dump of table {} aborted after {} rows: {}\n",
            quote_mysql(&self.table)?,
            self.rows,
            reason.replace(['\n', '\r'], " ")
        );
        emit(self.sink, comment.as_bytes()).await?;
        Ok(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Reverse mapping of the escaping table.
    fn unescape(escaped: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(escaped.len());
        let mut iter = escaped.iter();
        while let Some(&b) = iter.next() {
            if b != b'\\' {
                out.push(b);
                continue;
            }
            match iter.next() {
                Some(b'0') => out.push(0x00),
                Some(b'n') => out.push(b'\n'),
                Some(b'r') => out.push(b'\r'),
                Some(b'Z') => out.push(0x1a),
                Some(&other) => out.push(other),
                None => panic!("dangling escape"),
            }
        }
        out
    }

    #[test]
    fn test_escape_table() {
        let cases: &[(&[u8], &[u8])] = &[
            (b"\0", b"\\0"),
            (b"\n", b"\\n"),
            (b"\r", b"\\r"),
            (b"\\", b"\\\\"),
            (b"'", b"\\'"),
            (b"\"", b"\\\""),
            (b"\x1a", b"\\Z"),
            (b"plain text", b"plain text"),
        ];
        for (input, expected) in cases {
            let mut out = Vec::new();
            escape_into(input, &mut out);
            assert_eq!(&out[..], *expected, "escaping {:?}", input);
        }
    }

    #[test]
    fn test_multibyte_utf8_passes_through() {
        let value = "ñandú 'ü' 日本".as_bytes();
        assert_eq!(
            serialize_value(Some(value)),
            "'ñandú \\'ü\\' 日本'".as_bytes()
        );
    }

    #[test]
    fn test_binary_passes_through() {
        let value = [0xff, 0xfe, 0x00, 0x80, 0x1a];
        assert_eq!(
            serialize_value(Some(&value)),
            vec![b'\'', 0xff, 0xfe, b'\\', b'0', 0x80, b'\\', b'Z', b'\'']
        );
    }

    #[test]
    fn test_null_is_unquoted() {
        assert_eq!(serialize_value(None), b"NULL");
        assert_eq!(serialize_value(Some(b"NULL")), b"'NULL'");
        assert_eq!(serialize_value(Some(b"")), b"''");
    }

    #[test]
    fn test_serialize_row() {
        let row = Row::from_text([Some("1"), None, Some("name")]);
        assert_eq!(serialize_row(&row), b"( '1', NULL, 'name' )");
    }

    #[test]
    fn test_insert_header() {
        assert_eq!(
            insert_header("test", &cols(&["id", "test", "name"])).unwrap(),
            "INSERT INTO `test` (`id`, `test`, `name`)\nVALUES\n"
        );
    }

    #[tokio::test]
    async fn test_batch_two_rows() {
        let mut out: Vec<u8> = Vec::new();
        let mut writer = RowBatchWriter::new(&mut out, "test", &cols(&["id", "test", "name"])).unwrap();
        writer
            .push(&Row::from_text([Some("1"), Some("test"), Some("name")]))
            .await
            .unwrap();
        writer
            .push(&Row::from_text([Some("2"), Some("test"), Some("name")]))
            .await
            .unwrap();
        assert_eq!(writer.finish().await.unwrap(), 2);

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "LOCK TABLES `test` WRITE;\n\
             INSERT INTO `test` (`id`, `test`, `name`)\nVALUES\n\
             ( '1', 'test', 'name' ),\n\
             ( '2', 'test', 'name' );\n"
        );
    }

    #[tokio::test]
    async fn test_batch_holds_one_tuple() {
        let mut out: Vec<u8> = Vec::new();
        let mut writer = RowBatchWriter::new(&mut out, "t", &cols(&["id"])).unwrap();
        writer.push(&Row::from_text([Some("1")])).await.unwrap();
        writer.push(&Row::from_text([Some("2")])).await.unwrap();
        assert_eq!(writer.rows(), 2);
        drop(writer);
        // Second tuple is still pending, first one flushed with a comma
        assert!(String::from_utf8(out).unwrap().ends_with("VALUES\n( '1' ),\n"));
    }

    #[tokio::test]
    async fn test_batch_empty_table() {
        let mut out: Vec<u8> = Vec::new();
        let writer = RowBatchWriter::new(&mut out, "test", &cols(&["id"])).unwrap();
        assert_eq!(writer.finish().await.unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), "\n--Empty table\n");
    }

    #[tokio::test]
    async fn test_batch_rejects_wrong_width() {
        let mut out: Vec<u8> = Vec::new();
        let mut writer = RowBatchWriter::new(&mut out, "t", &cols(&["a", "b"])).unwrap();
        let err = writer.push(&Row::from_text([Some("1")])).await.unwrap_err();
        assert!(!err.is_fatal());
        drop(writer);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_abort_terminates_pending_statement() {
        let mut out: Vec<u8> = Vec::new();
        let mut writer = RowBatchWriter::new(&mut out, "t", &cols(&["id"])).unwrap();
        writer.push(&Row::from_text([Some("1")])).await.unwrap();
        assert_eq!(writer.abort("connection lost\nmid-read").await.unwrap(), 1);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("( '1' );\n"));
        assert!(text.ends_with("-- Dump of table `t` aborted after 1 rows: connection lost mid-read\n"));
    }

    proptest! {
        #[test]
        fn prop_escape_round_trips(raw in proptest::collection::vec(
            prop_oneof![
                Just(0x00u8), Just(b'\n'), Just(b'\r'), Just(b'\\'),
                Just(b'\''), Just(b'"'), Just(0x1au8), any::<u8>(),
            ],
            0..64,
        )) {
            let mut escaped = Vec::new();
            escape_into(&raw, &mut escaped);
            prop_assert_eq!(unescape(&escaped), raw);
        }

        #[test]
        fn prop_escaped_value_has_no_bare_quote(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut escaped = Vec::new();
            escape_into(&raw, &mut escaped);
            let mut prev_backslashes = 0usize;
            for &b in &escaped {
                if b == b'\'' {
                    prop_assert!(prev_backslashes % 2 == 1);
                }
                prev_backslashes = if b == b'\\' { prev_backslashes + 1 } else { 0 };
            }
        }
    }
}
