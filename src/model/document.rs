//! Document-level metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata read from the PDF info dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// PDF version (e.g., "1.7")
    pub pdf_version: String,

    /// Number of pages
    pub page_count: u32,

    /// Document title
    pub title: Option<String>,

    /// Producing application
    pub producer: Option<String>,

    /// Creation date; for the bulletin this is the publication date
    pub created: Option<DateTime<Utc>>,

    /// Last modification date
    pub modified: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Create metadata with a PDF version.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            pdf_version: version.into(),
            ..Default::default()
        }
    }
}
