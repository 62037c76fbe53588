//! Synthetic bulletin builder shared by the integration tests.
//!
//! Pages are drawn the way the municipal report draws them: every cell is a
//! stroked rectangle and every visual line of text is its own `Tj`. Cell text
//! is given in visual order, top line first, lines separated by `\n`.

#![allow(dead_code)]

const FONT_SIZE: f32 = 10.0;
const LINE_STEP: f32 = 11.0;

/// One ruled table placed on a page.
pub struct TableSpec {
    pub left: f32,
    pub top: f32,
    pub widths: Vec<f32>,
    pub row_height: f32,
    pub rows: Vec<Vec<String>>,
}

impl TableSpec {
    /// A table with 80pt columns and 30pt rows, top-left at (40, top).
    pub fn new(top: f32, rows: &[&[&str]]) -> Self {
        let columns = rows.first().map(|r| r.len()).unwrap_or(0);
        Self {
            left: 40.0,
            top,
            widths: vec![80.0; columns],
            row_height: 30.0,
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    /// Bottom edge, for stacking tables.
    pub fn bottom(&self) -> f32 {
        self.top - self.row_height * self.rows.len() as f32
    }

    fn content(&self) -> String {
        let mut out = String::new();
        for (r, row) in self.rows.iter().enumerate() {
            let row_top = self.top - self.row_height * r as f32;
            let mut x = self.left;
            for (c, cell) in row.iter().enumerate() {
                let width = self.widths.get(c).copied().unwrap_or(80.0);
                out.push_str(&format!(
                    "{} {} {} {} re S\n",
                    x,
                    row_top - self.row_height,
                    width,
                    self.row_height
                ));
                for (i, line) in cell.split('\n').enumerate() {
                    if line.is_empty() {
                        continue;
                    }
                    let baseline = row_top - 12.0 - LINE_STEP * i as f32;
                    out.push_str(&format!(
                        "BT /F1 {} Tf {} {} Td <{}> Tj ET\n",
                        FONT_SIZE,
                        x + 4.0,
                        baseline,
                        hex(line)
                    ));
                }
                x += width;
            }
        }
        out
    }
}

/// A page of the synthetic document.
pub enum PageSpec {
    Tables(Vec<TableSpec>),
    /// Free text lines without any rulings, one `Tj` per string at (x, y)
    Text(Vec<(f32, f32, String)>),
    /// `/Contents` points at something that is not a stream
    Broken,
}

impl PageSpec {
    pub fn table(rows: &[&[&str]]) -> Self {
        PageSpec::Tables(vec![TableSpec::new(760.0, rows)])
    }

    fn content(&self) -> Option<String> {
        match self {
            PageSpec::Tables(tables) => Some(tables.iter().map(TableSpec::content).collect()),
            PageSpec::Text(lines) => Some(
                lines
                    .iter()
                    .map(|(x, y, text)| {
                        format!(
                            "BT /F1 {} Tf {} {} Td <{}> Tj ET\n",
                            FONT_SIZE,
                            x,
                            y,
                            hex(text)
                        )
                    })
                    .collect(),
            ),
            PageSpec::Broken => None,
        }
    }
}

fn hex(text: &str) -> String {
    text.bytes().map(|b| format!("{:02X}", b)).collect()
}

/// Serialize pages into a PDF with a valid cross-reference table.
pub fn build_pdf(pages: &[PageSpec]) -> Vec<u8> {
    // Objects: 1 catalog, 2 page tree, then per page: page, content.
    let mut objects: Vec<Vec<u8>> = Vec::new();
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 3 + 2 * i))
        .collect();

    objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
    objects.push(
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        )
        .into_bytes(),
    );

    for (i, page) in pages.iter().enumerate() {
        let content_id = 4 + 2 * i;
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Contents {} 0 R >>",
                content_id
            )
            .into_bytes(),
        );
        match page.content() {
            Some(content) => {
                let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
                stream.extend_from_slice(content.as_bytes());
                stream.extend_from_slice(b"\nendstream");
                objects.push(stream);
            }
            None => objects.push(b"42".to_vec()),
        }
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        pdf.extend_from_slice(body);
        pdf.extend_from_slice(b"\nendobj\n");
    }

    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    pdf
}

/// Header row of the synthetic bulletin in visual order, and the logical
/// names it normalizes to.
pub const HEADER_VISUAL: [&str; 3] = ["חר", "תיב", "ןליא גוס"];
pub const HEADER: [&str; 3] = ["רח", "בית", "סוג אילן"];
