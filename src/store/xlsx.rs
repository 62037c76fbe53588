//! Excel workbook export.

use std::io::Write;

use rust_xlsxwriter::{Format, Workbook};

use super::RecordWriter;
use crate::error::{Error, Result};
use crate::model::Recordset;

/// Writes one right-to-left worksheet: a bold header row, then one row per
/// record. Blank cells are left unwritten.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxWriter;

fn cell(row: usize, column: usize) -> Result<(u32, u16)> {
    match (u32::try_from(row), u16::try_from(column)) {
        (Ok(row), Ok(column)) => Ok((row, column)),
        _ => Err(Error::Export(format!("cell ({}, {}) is out of range", row, column))),
    }
}

impl RecordWriter for XlsxWriter {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn write_to(&self, recordset: &Recordset, out: &mut dyn Write) -> Result<()> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_right_to_left(true);

        let bold = Format::new().set_bold();
        for (i, name) in recordset.schema().columns().iter().enumerate() {
            let (row, column) = cell(0, i)?;
            sheet.write_string_with_format(row, column, name, &bold)?;
        }

        for (r, record) in recordset.iter().enumerate() {
            for (i, value) in record.values().iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let (row, column) = cell(r + 1, i)?;
                sheet.write_string(row, column, value)?;
            }
        }

        out.write_all(&workbook.save_to_buffer()?)?;
        Ok(())
    }
}
