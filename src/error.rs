//! Error types for the felling library.

use std::io;
use thiserror::Error;

/// Result type alias for felling operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Position of a row inside the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowLocation {
    /// 1-indexed page number
    pub page: u32,
    /// 0-indexed table position on the page
    pub table: usize,
    /// 0-indexed row position in the table
    pub row: usize,
}

impl std::fmt::Display for RowLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {}, table {}, row {}", self.page, self.table, self.row)
    }
}

/// Error types that can occur while fetching, extracting and exporting permits.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The source document could not be retrieved.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// The bytes are not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF object structure could not be opened.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// A single page's layout could not be analyzed.
    #[error("Page {page} could not be analyzed: {message}")]
    PageParse {
        /// 1-indexed page number
        page: u32,
        /// Underlying failure
        message: String,
    },

    /// A data row's cell count disagrees with the established header.
    #[error("Row at {location} has {found} cells, header has {expected}")]
    Structural {
        /// Where the offending row sits
        location: RowLocation,
        /// Header width
        expected: usize,
        /// Cells in the row
        found: usize,
    },

    /// Geocoding of a single address failed.
    #[error("Geocoding failed for '{address}': {message}")]
    Enrichment {
        /// The address that was sent
        address: String,
        /// Underlying failure
        message: String,
    },

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Spreadsheet export failed.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] csv::Error),

    /// Parquet or workbook encoding failed.
    #[error("Export error: {0}")]
    Export(String),

    /// Copying a file to the archive failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The run configuration cannot be executed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error aborts the whole run.
    ///
    /// Page and enrichment failures are recovered per item.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::PageParse { .. } | Error::Enrichment { .. })
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Retrieval(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for Error {
    fn from(err: parquet::errors::ParquetError) -> Self {
        Error::Export(err.to_string())
    }
}

impl From<arrow_schema::ArrowError> for Error {
    fn from(err: arrow_schema::ArrowError) -> Self {
        Error::Export(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Error::Export(err.to_string())
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}
