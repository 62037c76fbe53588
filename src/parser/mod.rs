//! PDF parsing module.
//!
//! Turns PDF bytes into pages of raw tables: [`backend`] wraps lopdf,
//! [`layout`] interprets content streams into geometry and
//! [`table_detector`] partitions that geometry into rows and cells.

pub mod backend;
mod document;
pub mod layout;
mod options;
pub mod table_detector;

pub use document::{PageSource, PdfDocument};
pub use layout::{PageGeometry, Ruling, TextSpan};
pub use options::{PageSelection, ParseOptions};
pub use table_detector::{TableDetector, TableDetectorConfig};
