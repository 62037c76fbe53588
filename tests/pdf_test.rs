//! Integration tests for document parsing and table detection.

mod common;

use common::{build_pdf, PageSpec, TableSpec, HEADER, HEADER_VISUAL};
use felling::{
    detect_format_from_bytes, Error, PageSelection, PageSource, ParseOptions, PdfDocument,
};

fn bulletin() -> Vec<u8> {
    build_pdf(&[
        PageSpec::table(&[&HEADER_VISUAL, &["לצרה", "12", "ןולא"]]),
        PageSpec::table(&[&["למנה", "3", "\nלקשא"]]),
    ])
}

#[test]
fn test_detect_format() {
    let format = detect_format_from_bytes(&bulletin()).unwrap();
    assert_eq!(format.version, "1.4");
}

#[test]
fn test_open_counts_pages() {
    let document = PdfDocument::open(&bulletin()).unwrap();
    assert_eq!(document.page_count(), 2);
    assert_eq!(document.metadata().page_count, 2);
    assert_eq!(document.page_numbers(), vec![1, 2]);
}

#[test]
fn test_tables_follow_cell_borders() {
    let document = PdfDocument::open(&bulletin()).unwrap();
    let tables = document.extract_tables(1).unwrap();

    assert_eq!(tables.len(), 1);
    let table = &tables[0];
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column_count(), 3);
    assert_eq!(table.rows[0].cells, HEADER_VISUAL.map(String::from).to_vec());
    assert_eq!(table.rows[1].cells, vec!["לצרה", "12", "ןולא"]);
    assert_eq!(table.column_widths, Some(vec![80.0, 80.0, 80.0]));
}

#[test]
fn test_cell_lines_listed_top_down() {
    let pdf = build_pdf(&[PageSpec::table(&[&["a", "top\nbottom"], &["b", "c"]])]);
    let document = PdfDocument::open(&pdf).unwrap();
    let tables = document.extract_tables(1).unwrap();

    assert_eq!(tables[0].rows[0].cells, vec!["a", "top\nbottom"]);
}

#[test]
fn test_two_tables_on_one_page() {
    let upper = TableSpec::new(760.0, &[&["a", "b"], &["c", "d"]]);
    let lower = TableSpec::new(upper.bottom() - 40.0, &[&["e", "f"]]);
    let pdf = build_pdf(&[PageSpec::Tables(vec![lower, upper])]);

    let document = PdfDocument::open(&pdf).unwrap();
    let tables = document.extract_tables(1).unwrap();

    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].rows[0].cells, vec!["a", "b"]);
    assert_eq!(tables[1].rows[0].cells, vec!["e", "f"]);
}

#[test]
fn test_load_page_builds_page() {
    let document = PdfDocument::open(&bulletin()).unwrap();
    let page = document.load_page(2).unwrap();

    assert_eq!(page.number, 2);
    assert_eq!((page.width, page.height), (595.0, 842.0));
    assert_eq!(page.tables.len(), 1);
}

#[test]
fn test_page_selection_limits_pages() {
    let options = ParseOptions::new().with_pages(PageSelection::parse("2").unwrap());
    let document = PdfDocument::open_with_options(&bulletin(), options).unwrap();

    assert_eq!(document.page_numbers(), vec![2]);
    assert_eq!(document.page_count(), 2);
}

#[test]
fn test_broken_page_is_page_error() {
    let pdf = build_pdf(&[PageSpec::table(&[&["a", "b"]]), PageSpec::Broken]);
    let document = PdfDocument::open(&pdf).unwrap();

    assert!(document.load_page(1).is_ok());
    match document.load_page(2) {
        Err(Error::PageParse { page, .. }) => assert_eq!(page, 2),
        other => panic!("expected a page error, got {:?}", other.map(|p| p.number)),
    }
}

#[test]
fn test_missing_page_is_page_error() {
    let document = PdfDocument::open(&bulletin()).unwrap();
    assert!(matches!(
        document.extract_tables(9),
        Err(Error::PageParse { page: 9, .. })
    ));
}

#[test]
fn test_unruled_page_uses_alignment() {
    let lines = [700.0, 680.0, 660.0]
        .iter()
        .enumerate()
        .flat_map(|(i, &y)| {
            vec![
                (50.0, y, format!("name{}", i)),
                (200.0, y, format!("{}", i * 10)),
            ]
        })
        .collect();
    let pdf = build_pdf(&[PageSpec::Text(lines)]);
    let document = PdfDocument::open(&pdf).unwrap();

    let tables = document.extract_tables(1).unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].column_count(), 2);
    assert_eq!(tables[0].rows[0].cells, vec!["name0", "0"]);

    let lattice = ParseOptions::new().lattice_only();
    let document = PdfDocument::open_with_options(&pdf, lattice).unwrap();
    assert!(document.extract_tables(1).unwrap().is_empty());
}

#[test]
fn test_html_error_page_rejected() {
    let html = b"<!DOCTYPE html><html><body>Access denied</body></html>";
    assert!(matches!(
        PdfDocument::open(html),
        Err(Error::UnknownFormat)
    ));
}

#[test]
fn test_header_normalizes_to_logical_names() {
    let recordset = felling::extract_bytes(&bulletin()).unwrap();
    assert_eq!(recordset.schema().columns(), HEADER.map(String::from).as_slice());
}
