//! Persistence: Parquet, Excel, column-major JSON and CSV exports, plus
//! archival.
//!
//! Every file is written to a temporary sibling first and moved over the
//! target only after the whole write succeeded, so a failed run never
//! leaves a truncated export behind.

mod archive;
mod columnar;
mod parquet_file;
mod s3;
mod spreadsheet;
mod xlsx;

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

pub use archive::{archive_keys, upload_outputs, Archive, LocalArchive};
pub use columnar::{read_columnar, ColumnarWriter};
pub use parquet_file::{read_parquet, ParquetWriter};
pub use s3::S3Archive;
pub use spreadsheet::SpreadsheetWriter;
pub use xlsx::XlsxWriter;

use crate::error::Result;
use crate::model::Recordset;

/// A recordset export format.
pub trait RecordWriter {
    /// Short format name for logs.
    fn name(&self) -> &'static str;

    /// Serialize the records in schema order.
    fn write_to(&self, recordset: &Recordset, out: &mut dyn Write) -> Result<()>;

    /// Atomically write the recordset to `path`.
    fn write(&self, recordset: &Recordset, path: &Path) -> Result<()> {
        log::info!("Storing {} file {}", self.name(), path.display());
        write_atomic(path, |out| self.write_to(recordset, out))
    }
}

/// Write through a temporary file in the destination directory, then
/// rename it over `path`.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write(&mut out)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
