//! Normalized records.

use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Ordered column names shared by every record of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Create a schema from already-canonical column names.
    ///
    /// Use [`Schema::from_header_cells`] for names taken from a document.
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column by name.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Whether a column exists.
    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// A new schema with `extra` columns appended after the existing ones.
    pub fn extended<S: Into<String>>(&self, extra: impl IntoIterator<Item = S>) -> Self {
        let mut columns = self.columns.clone();
        columns.extend(extra.into_iter().map(Into::into));
        Self { columns }
    }
}

/// One data row mapped onto a [`Schema`].
///
/// Lookups are by column name; iteration follows schema order, so
/// serialization is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<String>,
}

impl Record {
    /// Zip values with a schema.
    ///
    /// Returns `None` when the value count differs from the schema width;
    /// a record never has missing or extra fields.
    pub fn new(schema: Arc<Schema>, values: Vec<String>) -> Option<Self> {
        (values.len() == schema.len()).then_some(Self { schema, values })
    }

    /// The shared schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Value for a column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.schema
            .position(column)
            .map(|i| self.values[i].as_str())
    }

    /// Values in schema order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.schema
            .columns()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    /// Re-home this record onto a wider schema by appending values.
    ///
    /// Returns `None` if the result would not match `schema`.
    pub fn extend(mut self, schema: Arc<Schema>, extra: Vec<String>) -> Option<Self> {
        self.values.extend(extra);
        Self::new(schema, self.values)
    }

    /// Consume into the value vector.
    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// The ordered records of one run, all sharing one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Recordset {
    schema: Arc<Schema>,
    records: Vec<Record>,
}

impl Recordset {
    /// Create an empty recordset.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    /// An empty recordset with no columns.
    pub fn empty() -> Self {
        Self::new(Arc::new(Schema::new(Vec::new())))
    }

    /// Build from records already mapped onto `schema`.
    ///
    /// Returns `None` if any record carries a different schema.
    pub fn from_records(schema: Arc<Schema>, records: Vec<Record>) -> Option<Self> {
        records
            .iter()
            .all(|r| *r.schema == *schema)
            .then_some(Self { schema, records })
    }

    /// Records built against `schema` by this crate.
    pub(crate) fn from_built(schema: Arc<Schema>, records: Vec<Record>) -> Self {
        debug_assert!(records.iter().all(|r| Arc::ptr_eq(&r.schema, &schema)));
        Self { schema, records }
    }

    /// Append a record. Returns it back if its schema differs.
    pub fn push(&mut self, record: Record) -> Result<(), Record> {
        if *record.schema != *self.schema {
            return Err(record);
        }
        self.records.push(record);
        Ok(())
    }

    /// The shared schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Records in order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Iterate records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume into records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl<'a> IntoIterator for &'a Recordset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
