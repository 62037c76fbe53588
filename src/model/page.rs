//! Page-level types.

use super::RawTable;
use serde::{Deserialize, Serialize};

/// A single page reduced to the tables found on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Tables in top-to-bottom order
    pub tables: Vec<RawTable>,
}

impl Page {
    /// Create a new page with the given dimensions.
    pub fn new(number: u32, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            tables: Vec::new(),
        }
    }

    /// Create a new page with standard A4 size (210 x 297 mm).
    pub fn a4(number: u32) -> Self {
        Self::new(number, 595.0, 842.0) // 210mm * 2.834, 297mm * 2.834
    }

    /// Add a table to the page.
    pub fn add_table(&mut self, table: RawTable) {
        self.tables.push(table);
    }

    /// Builder-style variant of [`Page::add_table`].
    pub fn with_table(mut self, table: RawTable) -> Self {
        self.add_table(table);
        self
    }

    /// Total rows across all tables.
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(RawTable::row_count).sum()
    }

    /// Check if the page has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
