//! Parsing options and configuration.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::error::{Error, Result};

use super::table_detector::TableDetectorConfig;

/// Options for opening a bulletin and extracting its tables.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Page selection (which pages to analyze)
    pub pages: PageSelection,

    /// Table detection tuning
    pub detector: TableDetectorConfig,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Set table detector configuration.
    pub fn with_detector(mut self, detector: TableDetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// Only use ruled grids; pages without them yield no tables.
    pub fn lattice_only(mut self) -> Self {
        self.detector.stream_fallback = false;
        self
    }
}

/// Page selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// All pages
    #[default]
    All,
    /// A range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Specific pages (1-indexed, sorted, unique)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.binary_search(&page).is_ok(),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        let number = |t: &str| {
            t.trim()
                .parse::<u32>()
                .map_err(|_| Error::Config(format!("Invalid page number: '{}'", t.trim())))
        };

        if !s.contains(',') {
            if let Some((start, end)) = s.split_once('-') {
                return Ok(PageSelection::Range(number(start)?..=number(end)?));
            }
        }

        let mut pages = BTreeSet::new();
        for part in s.split(',') {
            match part.split_once('-') {
                Some((start, end)) => pages.extend(number(start)?..=number(end)?),
                None => {
                    pages.insert(number(part)?);
                }
            }
        }

        Ok(PageSelection::Pages(pages.into_iter().collect()))
    }
}
