//! Raw row values as read from the data source.
//!
//! Values are kept as the server's textual bytes, never decoded into typed
//! values: escaping works on bytes, and decoding would lose the exact text
//! the server would accept back on replay (float formatting, zero dates,
//! binary blobs that are not valid UTF-8).

/// One field of a row: raw bytes, or `None` for SQL NULL.
pub type RawValue = Option<Vec<u8>>;

/// One row in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<RawValue>,
}

impl Row {
    /// Create a row from raw values in column order.
    pub fn new(values: Vec<RawValue>) -> Self {
        Self { values }
    }

    /// Build a row from text fields, `None` meaning NULL.
    ///
    /// ```
    /// use sqldump::core::Row;
    ///
    /// let row = Row::from_text([Some("1"), None, Some("name")]);
    /// assert_eq!(row.len(), 3);
    /// assert!(row.get(1).unwrap().is_none());
    /// ```
    pub fn from_text<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        Self {
            values: fields
                .into_iter()
                .map(|f| f.map(|s| s.as_bytes().to_vec()))
                .collect(),
        }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Field at `idx`: `Some(None)` is a NULL field, `None` is out of range.
    pub fn get(&self, idx: usize) -> Option<Option<&[u8]>> {
        self.values.get(idx).map(|v| v.as_deref())
    }

    /// Iterate over fields in column order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&[u8]>> {
        self.values.iter().map(|v| v.as_deref())
    }
}

impl From<Vec<RawValue>> for Row {
    fn from(values: Vec<RawValue>) -> Self {
        Self::new(values)
    }
}
