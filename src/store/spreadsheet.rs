//! Spreadsheet (CSV) export.

use std::io::Write;

use super::RecordWriter;
use crate::error::Result;
use crate::model::Recordset;

/// UTF-8 byte order mark; spreadsheet applications use it to detect the
/// encoding of Hebrew text.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes RFC 4180 CSV with a header line, columns in schema order.
#[derive(Debug, Clone, Copy)]
pub struct SpreadsheetWriter {
    bom: bool,
}

impl Default for SpreadsheetWriter {
    fn default() -> Self {
        Self { bom: true }
    }
}

impl SpreadsheetWriter {
    /// Create a writer that emits the byte order mark.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the byte order mark.
    pub fn with_bom(mut self, bom: bool) -> Self {
        self.bom = bom;
        self
    }
}

impl RecordWriter for SpreadsheetWriter {
    fn name(&self) -> &'static str {
        "spreadsheet"
    }

    fn write_to(&self, recordset: &Recordset, out: &mut dyn Write) -> Result<()> {
        if self.bom {
            out.write_all(UTF8_BOM)?;
        }

        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(recordset.schema().columns())?;
        for record in recordset {
            writer.write_record(record.values())?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, Schema};
    use std::sync::Arc;

    #[test]
    fn test_csv_quoting_and_order() {
        let schema = Arc::new(Schema::new(vec!["שם".into(), "הערה".into()]));
        let record = Record::new(Arc::clone(&schema), vec!["אלון".into(), "a, \"b\"".into()]).unwrap();
        let set = Recordset::from_records(schema, vec![record]).unwrap();

        let mut out = Vec::new();
        SpreadsheetWriter::new()
            .with_bom(false)
            .write_to(&set, &mut out)
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "שם,הערה\nאלון,\"a, \"\"b\"\"\"\n"
        );
    }

    #[test]
    fn test_bom_prefix() {
        let mut out = Vec::new();
        SpreadsheetWriter::new()
            .write_to(&Recordset::empty(), &mut out)
            .unwrap();
        assert!(out.starts_with(UTF8_BOM));
    }
}
