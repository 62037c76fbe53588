//! Column-major JSON export.
//!
//! ```json
//! {"columns": ["a", "b"], "data": [["a1", "a2"], ["b1", "b2"]]}
//! ```
//!
//! `data[i]` holds every value of `columns[i]` in record order.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use super::RecordWriter;
use crate::error::{Error, Result};
use crate::model::{Record, Recordset, Schema};

#[derive(Serialize, Deserialize)]
struct ColumnarFile {
    columns: Vec<String>,
    data: Vec<Vec<String>>,
}

/// Writes the column-major JSON format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnarWriter;

impl RecordWriter for ColumnarWriter {
    fn name(&self) -> &'static str {
        "columnar"
    }

    fn write_to(&self, recordset: &Recordset, out: &mut dyn Write) -> Result<()> {
        let columns = recordset.schema().columns().to_vec();
        let mut data: Vec<Vec<String>> = vec![Vec::with_capacity(recordset.len()); columns.len()];
        for record in recordset {
            for (column, value) in data.iter_mut().zip(record.values()) {
                column.push(value.clone());
            }
        }

        serde_json::to_writer(out, &ColumnarFile { columns, data })?;
        Ok(())
    }
}

/// Load a recordset written by [`ColumnarWriter`].
pub fn read_columnar(path: &Path) -> Result<Recordset> {
    let file = File::open(path)?;
    let ColumnarFile { columns, data } = serde_json::from_reader(BufReader::new(file))?;

    let invalid = |message: String| Error::Serialization(serde_json::Error::custom(message));

    if data.len() != columns.len() {
        return Err(invalid(format!(
            "{} columns but {} data arrays",
            columns.len(),
            data.len()
        )));
    }
    let rows = data.first().map(Vec::len).unwrap_or(0);
    if let Some(i) = data.iter().position(|c| c.len() != rows) {
        return Err(invalid(format!(
            "column '{}' has {} values, expected {}",
            columns[i],
            data[i].len(),
            rows
        )));
    }

    let schema = Arc::new(Schema::new(columns));
    let mut iters: Vec<_> = data.into_iter().map(Vec::into_iter).collect();
    let mut records = Vec::with_capacity(rows);
    for _ in 0..rows {
        let values: Vec<String> = iters.iter_mut().filter_map(Iterator::next).collect();
        let record = Record::new(Arc::clone(&schema), values)
            .ok_or_else(|| invalid("ragged columns".to_string()))?;
        records.push(record);
    }

    log::info!("Read {} records from {}", records.len(), path.display());
    Ok(Recordset::from_built(schema, records))
}
