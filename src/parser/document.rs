//! The opened bulletin.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document as LopdfDocument, Object};

use crate::detect::detect_format_from_bytes;
use crate::error::{Error, Result};
use crate::model::{Metadata, Page, RawTable};

use super::backend::{decode_unmapped, LopdfBackend, PageId, PdfBackend};
use super::layout::extract_geometry;
use super::options::ParseOptions;
use super::table_detector::TableDetector;

/// Fallback page size (A4) when no MediaBox is present.
const DEFAULT_PAGE_SIZE: (f32, f32) = (595.0, 842.0);

/// Anything that yields pages of raw tables, one page at a time.
///
/// The assembler only pulls pages through this trait, so a source may do all
/// of its work lazily in [`PageSource::load_page`].
pub trait PageSource {
    /// Page numbers to visit, in document order.
    fn page_numbers(&self) -> Vec<u32>;

    /// Analyze one page.
    ///
    /// An [`Error::PageParse`] is recovered by the caller; any other error
    /// ends the run.
    fn load_page(&self, number: u32) -> Result<Page>;
}

impl<T: PageSource + ?Sized> PageSource for &T {
    fn page_numbers(&self) -> Vec<u32> {
        (**self).page_numbers()
    }

    fn load_page(&self, number: u32) -> Result<Page> {
        (**self).load_page(number)
    }
}

/// Pre-built pages, mostly for tests and benchmarks.
impl PageSource for Vec<Page> {
    fn page_numbers(&self) -> Vec<u32> {
        self.iter().map(|p| p.number).collect()
    }

    fn load_page(&self, number: u32) -> Result<Page> {
        self.iter()
            .find(|p| p.number == number)
            .cloned()
            .ok_or_else(|| Error::PageParse {
                page: number,
                message: "no such page".to_string(),
            })
    }
}

/// A parsed PDF whose pages are analyzed on demand.
pub struct PdfDocument {
    backend: LopdfBackend,
    pages: BTreeMap<u32, PageId>,
    options: ParseOptions,
    detector: TableDetector,
    metadata: Metadata,
}

impl PdfDocument {
    /// Open a PDF from bytes.
    pub fn open(data: &[u8]) -> Result<Self> {
        Self::open_with_options(data, ParseOptions::default())
    }

    /// Open a PDF from bytes with custom options.
    pub fn open_with_options(data: &[u8], options: ParseOptions) -> Result<Self> {
        let format = detect_format_from_bytes(data)?;
        let backend = LopdfBackend::load_bytes(data)?;

        if backend.is_encrypted() {
            log::warn!("Document is encrypted; text may not decode");
        }

        let pages = backend.pages();
        let metadata = extract_metadata(backend.raw_doc(), pages.len() as u32);
        log::info!("Opened {} with {} pages", format, pages.len());

        Ok(Self {
            backend,
            pages,
            detector: TableDetector::with_config(options.detector.clone()),
            options,
            metadata,
        })
    }

    /// Open a PDF file.
    pub fn open_path<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::open_with_options(&data, options)
    }

    /// Document metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Get the number of pages.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Detect the tables on one page.
    ///
    /// Any failure reading the page's content is reported as
    /// [`Error::PageParse`] for that page.
    pub fn extract_tables(&self, number: u32) -> Result<Vec<RawTable>> {
        let page_error = |message: String| Error::PageParse {
            page: number,
            message,
        };

        let page_id = *self
            .pages
            .get(&number)
            .ok_or_else(|| page_error(format!("page out of range (1-{})", self.page_count())))?;

        let geometry =
            extract_geometry(&self.backend, page_id).map_err(|e| page_error(e.to_string()))?;
        Ok(self.detector.detect(&geometry))
    }

    fn page_dimensions(&self, number: u32) -> (f32, f32) {
        self.pages
            .get(&number)
            .and_then(|id| self.backend.media_box(*id))
            .map(|[x0, y0, x1, y1]| ((x1 - x0).abs(), (y1 - y0).abs()))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

impl PageSource for PdfDocument {
    fn page_numbers(&self) -> Vec<u32> {
        self.pages
            .keys()
            .copied()
            .filter(|n| self.options.pages.includes(*n))
            .collect()
    }

    fn load_page(&self, number: u32) -> Result<Page> {
        let (width, height) = self.page_dimensions(number);
        let mut page = Page::new(number, width, height);
        page.tables = self.extract_tables(number)?;
        log::debug!("Page {}: {} tables", number, page.tables.len());
        Ok(page)
    }
}

fn extract_metadata(doc: &LopdfDocument, page_count: u32) -> Metadata {
    let mut metadata = Metadata::with_version(doc.version.to_string());
    metadata.page_count = page_count;

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    if let Some(info) = info {
        metadata.title = get_string_from_dict(info, b"Title");
        metadata.producer = get_string_from_dict(info, b"Producer");
        metadata.created = get_string_from_dict(info, b"CreationDate").and_then(|s| parse_pdf_date(&s));
        metadata.modified = get_string_from_dict(info, b"ModDate").and_then(|s| parse_pdf_date(&s));
    }

    metadata
}

fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => Some(decode_unmapped(bytes)),
        Object::Name(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

/// Parse a PDF date string (D:YYYYMMDDHHmmSSOHH'mm').
fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.strip_prefix("D:").unwrap_or(s);
    let field = |range: std::ops::Range<usize>, default: u32| {
        s.get(range).and_then(|v| v.parse().ok()).unwrap_or(default)
    };

    let year: i32 = s.get(0..4)?.parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(year, field(4..6, 1), field(6..8, 1))
        .and_then(|date| date.and_hms_opt(field(8..10, 0), field(10..12, 0), field(12..14, 0)))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}
