//! PDF sniffing for downloaded bytes.
//!
//! Bulletins are fetched over HTTP, sometimes through a scraping proxy, and a
//! failed download frequently yields an HTML error page with a 200 status.
//! Sniffing the bytes before handing them to the PDF parser turns that case
//! into a clear [`Error::UnknownFormat`] instead of an opaque parse failure.

use crate::error::{Error, Result};

/// PDF format information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Bytes of junk before the `%PDF-` marker
    pub offset: usize,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// Readers accept the header anywhere in the first kilobyte.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Detect the PDF header in raw bytes.
///
/// # Returns
/// * `Ok(PdfFormat)` if a valid `%PDF-x.y` header is found
/// * `Err(Error::UnknownFormat)` otherwise
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;

    let start = offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(start..start + VERSION_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnknownFormat);
    }

    Ok(PdfFormat { version, offset })
}

/// Check if bytes carry a PDF header.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}

/// Heuristic for an HTML page served in place of the document.
pub fn looks_like_html(data: &[u8]) -> bool {
    let head = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let head = head.trim_start_matches('\u{feff}').trim_start();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_valid_pdf() {
        let data = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3";
        let format = detect_format_from_bytes(data).unwrap();
        assert_eq!(format.version, "1.7");
        assert_eq!(format.offset, 0);
    }

    #[test]
    fn test_detect_with_leading_junk() {
        let data = b"\r\n\r\n%PDF-1.4\n";
        let format = detect_format_from_bytes(data).unwrap();
        assert_eq!(format.version, "1.4");
        assert_eq!(format.offset, 4);
    }

    #[test]
    fn test_detect_html_error_page() {
        let data = b"<!DOCTYPE html><html><body>403</body></html>";
        assert!(matches!(
            detect_format_from_bytes(data),
            Err(Error::UnknownFormat)
        ));
        assert!(looks_like_html(data));
    }

    #[test]
    fn test_detect_truncated() {
        assert!(matches!(
            detect_format_from_bytes(b"%PDF-1"),
            Err(Error::UnknownFormat)
        ));
        assert!(!is_pdf_bytes(b""));
    }

    #[test]
    fn test_version_validation() {
        assert!(is_valid_version("1.0"));
        assert!(is_valid_version("2.0"));
        assert!(!is_valid_version("10.0"));
        assert!(!is_valid_version("abc"));
    }
}
