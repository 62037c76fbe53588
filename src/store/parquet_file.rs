//! Parquet export and reload.
//!
//! Every column is stored as non-null UTF-8; blank cells are empty strings.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{Array, ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema as ArrowSchema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::RecordWriter;
use crate::error::{Error, Result};
use crate::model::{Record, Recordset, Schema};

/// Writes a single-row-group, snappy-compressed Parquet file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetWriter;

impl RecordWriter for ParquetWriter {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn write_to(&self, recordset: &Recordset, out: &mut dyn Write) -> Result<()> {
        let columns = recordset.schema().columns();
        let fields: Vec<Field> = columns
            .iter()
            .map(|name| Field::new(name.as_str(), DataType::Utf8, false))
            .collect();
        let arrow_schema = Arc::new(ArrowSchema::new(fields));
        let properties = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        // ArrowWriter wants a `Send` sink.
        let mut buffer = Vec::new();
        let mut writer =
            ArrowWriter::try_new(&mut buffer, Arc::clone(&arrow_schema), Some(properties))?;
        if !recordset.is_empty() {
            let arrays: Vec<ArrayRef> = (0..columns.len())
                .map(|i| {
                    let values = recordset.iter().map(|r| r.values()[i].as_str());
                    Arc::new(StringArray::from_iter_values(values)) as ArrayRef
                })
                .collect();
            writer.write(&RecordBatch::try_new(arrow_schema, arrays)?)?;
        }
        writer.close()?;

        out.write_all(&buffer)?;
        Ok(())
    }
}

/// Load a recordset written by [`ParquetWriter`].
pub fn read_parquet(path: &Path) -> Result<Recordset> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let schema = Arc::new(Schema::new(columns));

    let mut records = Vec::new();
    for batch in builder.build()? {
        let batch = batch?;
        let arrays = batch
            .columns()
            .iter()
            .zip(schema.columns())
            .map(|(array, name)| {
                array
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| Error::Export(format!("column '{}' is not text", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            let values = arrays
                .iter()
                .map(|a| if a.is_null(row) { String::new() } else { a.value(row).to_string() })
                .collect();
            let record = Record::new(Arc::clone(&schema), values)
                .ok_or_else(|| Error::Export(format!("row {} does not match the schema", row)))?;
            records.push(record);
        }
    }

    log::info!("Read {} records from {}", records.len(), path.display());
    Ok(Recordset::from_built(schema, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Recordset {
        let schema = Arc::new(Schema::new(vec!["רח".into(), "הערה".into()]));
        let records = vec![
            Record::new(Arc::clone(&schema), vec!["הרצל".into(), "a, \"b\"".into()]).unwrap(),
            Record::new(Arc::clone(&schema), vec!["הנמל".into(), "".into()]).unwrap(),
        ];
        Recordset::from_records(schema, records).unwrap()
    }

    #[test]
    fn test_roundtrip_keeps_order_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permits.parquet");
        ParquetWriter.write(&sample(), &path).unwrap();

        let loaded = read_parquet(&path).unwrap();
        assert_eq!(loaded, sample());
        assert_eq!(loaded.records()[1].get("הערה"), Some(""));
    }

    #[test]
    fn test_magic_bytes() {
        let mut out = Vec::new();
        ParquetWriter.write_to(&sample(), &mut out).unwrap();
        assert!(out.starts_with(b"PAR1"));
        assert!(out.ends_with(b"PAR1"));
    }

    #[test]
    fn test_schema_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");
        let schema = Arc::new(Schema::new(vec!["רח".into()]));
        ParquetWriter.write(&Recordset::new(schema), &path).unwrap();

        let loaded = read_parquet(&path).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.schema().columns(), ["רח".to_string()]);
    }

    #[test]
    fn test_not_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.parquet");
        std::fs::write(&path, b"{}").unwrap();
        assert!(matches!(read_parquet(&path), Err(Error::Export(_))));
    }
}
