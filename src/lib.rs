//! # felling
//!
//! Extract tree-felling permit tables from municipal PDF bulletins.
//!
//! The bulletin is a multi-page PDF of ruled tables in Hebrew. This crate
//! finds the tables on every page, turns visually ordered cell text into
//! logical reading order and yields one record per permit, keyed by the
//! header of the first table.
//!
//! ## Quick Start
//!
//! ```no_run
//! use felling::{extract_file, RecordWriter, SpreadsheetWriter};
//!
//! fn main() -> felling::Result<()> {
//!     let recordset = extract_file("rptPirsum.pdf")?;
//!     for record in &recordset {
//!         println!("{:?}", record.get("רח"));
//!     }
//!     SpreadsheetWriter::new().write(&recordset, "permits.csv".as_ref())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! [`assemble`] returns a lazy iterator; pages are analyzed only as records
//! are pulled.
//!
//! ```no_run
//! use felling::{assemble, AssembleOptions, PdfDocument};
//!
//! let data = std::fs::read("rptPirsum.pdf")?;
//! let document = PdfDocument::open(&data)?;
//! for record in assemble(document, AssembleOptions::default()).take(10) {
//!     println!("{:?}", record?.values());
//! }
//! # Ok::<(), felling::Error>(())
//! ```
//!
//! ## Features
//!
//! - **Ruled-table detection** with a whitespace-alignment fallback
//! - **Bidirectional text** via the Unicode Bidirectional Algorithm
//! - **Page-level resilience**: a corrupt page is skipped, not fatal
//! - **Exports**: Parquet, Excel, column-major JSON and CSV, written atomically
//! - **Enrichment and archival** for the full fetch-to-archive run

pub mod assemble;
pub mod config;
pub mod detect;
pub mod enrich;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod source;
pub mod store;
pub mod text;

// Re-export commonly used types
pub use assemble::{assemble, AssembleOptions, ExtractionStats, Records, RowPolicy};
pub use config::{ArchiveConfig, Config, GeocodingConfig, ProxyConfig, S3Config};
pub use detect::{detect_format_from_bytes, PdfFormat};
pub use enrich::{enrich_records, GeoLocation, Geocoder, GoogleGeocoder};
pub use error::{Error, Result, RowLocation};
pub use model::{Metadata, Page, RawRow, RawTable, Record, Recordset, Schema};
pub use parser::{PageSelection, PageSource, ParseOptions, PdfDocument, TableDetectorConfig};
pub use pipeline::{Pipeline, ProgressEvent, RunOutput, RunSummary, Stage};
pub use schema::normalize_schema;
pub use source::{DocumentSource, FileSource, HttpSource};
pub use store::{
    read_columnar, read_parquet, Archive, ColumnarWriter, LocalArchive, ParquetWriter,
    RecordWriter, S3Archive, SpreadsheetWriter, XlsxWriter,
};
pub use text::{join_cell, normalize};

use std::path::Path;

/// Extract all records from PDF bytes.
///
/// # Example
///
/// ```no_run
/// let data = std::fs::read("rptPirsum.pdf").unwrap();
/// let recordset = felling::extract_bytes(&data).unwrap();
/// println!("{} permits", recordset.len());
/// ```
pub fn extract_bytes(data: &[u8]) -> Result<Recordset> {
    extract_bytes_with_options(data, ParseOptions::default(), AssembleOptions::default())
        .map(|(recordset, _)| recordset)
}

/// Extract all records from PDF bytes with custom options, returning the
/// extraction counters as well.
pub fn extract_bytes_with_options(
    data: &[u8],
    parse: ParseOptions,
    options: AssembleOptions,
) -> Result<(Recordset, ExtractionStats)> {
    let document = PdfDocument::open_with_options(data, parse)?;
    assemble(document, options).collect_recordset()
}

/// Extract all records from a PDF file.
pub fn extract_file<P: AsRef<Path>>(path: P) -> Result<Recordset> {
    let data = std::fs::read(path)?;
    extract_bytes(&data)
}
