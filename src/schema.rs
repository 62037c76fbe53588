//! Schema normalization.
//!
//! Column names come from the document's header row and go through the same
//! [`join_cell`] pass as every data cell. Nothing here depends on column
//! position or content; every column is treated identically.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result, RowLocation};
use crate::model::{RawRow, Record, Recordset, Schema};
use crate::text::join_cell;

impl Schema {
    /// Build column names from joined header cells.
    ///
    /// Names must be usable as map keys, so a blank header cell becomes
    /// `column_{n}` (1-based position) and a repeated name gets a `_2`,
    /// `_3`, ... suffix.
    pub fn from_header_cells(cells: &[String]) -> Schema {
        let mut seen: HashSet<String> = HashSet::new();
        let mut columns = Vec::with_capacity(cells.len());

        for (i, cell) in cells.iter().enumerate() {
            let base = if cell.trim().is_empty() {
                format!("column_{}", i + 1)
            } else {
                cell.clone()
            };

            let mut name = base.clone();
            let mut n = 2;
            while seen.contains(&name) {
                name = format!("{}_{}", base, n);
                n += 1;
            }

            if name != *cell {
                log::debug!("Header cell {} renamed to '{}'", i + 1, name);
            }
            seen.insert(name.clone());
            columns.push(name);
        }

        Schema::new(columns)
    }
}

/// Join every cell of a raw row.
pub fn join_row(row: &RawRow) -> Vec<String> {
    row.cells.iter().map(|c| join_cell(c)).collect()
}

/// Zip joined values with the schema.
///
/// A length mismatch is an [`Error::Structural`]; values are never padded or
/// truncated.
pub fn build_record(schema: &Arc<Schema>, values: Vec<String>, location: RowLocation) -> Result<Record> {
    let found = values.len();
    Record::new(Arc::clone(schema), values).ok_or(Error::Structural {
        location,
        expected: schema.len(),
        found,
    })
}

/// Normalize a raw header and its data rows into a recordset.
///
/// Every cell, header included, is joined exactly once. Row locations in
/// errors refer to positions in `rows` (page and table 0).
pub fn normalize_schema<I>(raw_header: &RawRow, rows: I) -> Result<Recordset>
where
    I: IntoIterator<Item = RawRow>,
{
    let schema = Arc::new(Schema::from_header_cells(&join_row(raw_header)));

    let records = rows
        .into_iter()
        .enumerate()
        .map(|(row, raw)| {
            let location = RowLocation {
                row,
                ..Default::default()
            };
            build_record(&schema, join_row(&raw), location)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Recordset::from_built(schema, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_names_kept() {
        let schema = Schema::from_header_cells(&strings(&["רחוב", "מספר בית", "סוג העץ"]));
        assert_eq!(schema.columns(), &strings(&["רחוב", "מספר בית", "סוג העץ"])[..]);
    }

    #[test]
    fn test_blank_header_cells_named_by_position() {
        let schema = Schema::from_header_cells(&strings(&["a", "", " "]));
        assert_eq!(schema.columns(), &strings(&["a", "column_2", "column_3"])[..]);
    }

    #[test]
    fn test_duplicate_header_cells_suffixed() {
        let schema = Schema::from_header_cells(&strings(&["x", "x", "x_2", "x"]));
        assert_eq!(schema.columns(), &strings(&["x", "x_2", "x_2_2", "x_3"])[..]);
    }

    #[test]
    fn test_normalize_schema_joins_every_cell() {
        let header = RawRow::from_strings(["םש", "ריע"]);
        let rows = vec![RawRow::from_strings(["ןולא", "הפיח"])];

        let recordset = normalize_schema(&header, rows).unwrap();
        assert_eq!(recordset.schema().columns(), &strings(&["שם", "עיר"])[..]);
        assert_eq!(recordset.records()[0].get("עיר"), Some("חיפה"));
    }

    #[test]
    fn test_normalize_schema_arity_mismatch() {
        let header = RawRow::from_strings(["a", "b"]);
        let rows = vec![
            RawRow::from_strings(["1", "2"]),
            RawRow::from_strings(["1", "2", "3"]),
        ];

        match normalize_schema(&header, rows) {
            Err(Error::Structural {
                location,
                expected,
                found,
            }) => {
                assert_eq!(location.row, 1);
                assert_eq!((expected, found), (2, 3));
            }
            other => panic!("expected structural error, got {:?}", other),
        }
    }
}
