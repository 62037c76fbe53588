//! Page geometry extraction.
//!
//! Interprets a page's content stream into positioned text spans and
//! axis-aligned ruling lines. The table detector works purely on this
//! geometry, so the interpreter is kept independent of lopdf and can be fed
//! synthetic operation lists.

use super::backend::{decode_unmapped, Operand, Operation, PageId, PdfBackend};
use crate::error::Result;

/// Glyph advance used when no font metrics are consulted, as a fraction of
/// the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Segments shorter than this (in points) are ignored.
const MIN_RULING_LENGTH: f32 = 2.0;

/// Maximum slope deviation for a segment to count as axis-aligned.
const AXIS_TOLERANCE: f32 = 0.5;

/// A text span with position information.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// The text content, in content-stream (visual) order
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Estimated advance width
    pub width: f32,
    /// Effective font size in points
    pub font_size: f32,
}

impl TextSpan {
    /// Create a new text span with an estimated width.
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_size: f32) -> Self {
        let text = text.into();
        let width = text.chars().count() as f32 * font_size * AVG_GLYPH_WIDTH;
        Self {
            text,
            x,
            y,
            width,
            font_size,
        }
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// A point safely inside the glyph box, used for cell assignment.
    pub fn anchor(&self) -> (f32, f32) {
        (self.x + 0.5, self.y + self.font_size * 0.3)
    }
}

/// An axis-aligned line segment in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ruling {
    /// Horizontal line at `y` spanning `x0..=x1`
    Horizontal { y: f32, x0: f32, x1: f32 },
    /// Vertical line at `x` spanning `y0..=y1`
    Vertical { x: f32, y0: f32, y1: f32 },
}

impl Ruling {
    /// Classify a segment; `None` for diagonal or tiny segments.
    pub fn from_points((ax, ay): (f32, f32), (bx, by): (f32, f32)) -> Option<Self> {
        let dx = (bx - ax).abs();
        let dy = (by - ay).abs();

        if dy <= AXIS_TOLERANCE && dx >= MIN_RULING_LENGTH {
            Some(Ruling::Horizontal {
                y: (ay + by) / 2.0,
                x0: ax.min(bx),
                x1: ax.max(bx),
            })
        } else if dx <= AXIS_TOLERANCE && dy >= MIN_RULING_LENGTH {
            Some(Ruling::Vertical {
                x: (ax + bx) / 2.0,
                y0: ay.min(by),
                y1: ay.max(by),
            })
        } else {
            None
        }
    }

    /// Whether two rulings touch, within `tolerance` points.
    pub fn touches(&self, other: &Ruling, tolerance: f32) -> bool {
        use Ruling::*;
        match (*self, *other) {
            (Horizontal { y, x0, x1 }, Vertical { x, y0, y1 })
            | (Vertical { x, y0, y1 }, Horizontal { y, x0, x1 }) => {
                x >= x0 - tolerance
                    && x <= x1 + tolerance
                    && y >= y0 - tolerance
                    && y <= y1 + tolerance
            }
            (Horizontal { y: ya, x0: a0, x1: a1 }, Horizontal { y: yb, x0: b0, x1: b1 }) => {
                (ya - yb).abs() <= tolerance && a0 <= b1 + tolerance && b0 <= a1 + tolerance
            }
            (Vertical { x: xa, y0: a0, y1: a1 }, Vertical { x: xb, y0: b0, y1: b1 }) => {
                (xa - xb).abs() <= tolerance && a0 <= b1 + tolerance && b0 <= a1 + tolerance
            }
        }
    }
}

/// Everything the table detector needs from one page.
#[derive(Debug, Clone, Default)]
pub struct PageGeometry {
    /// Text spans in content-stream order
    pub spans: Vec<TextSpan>,
    /// Stroked or filled axis-aligned segments
    pub rulings: Vec<Ruling>,
}

/// Extract geometry for a page through a backend.
pub fn extract_geometry<B: PdfBackend + ?Sized>(backend: &B, page: PageId) -> Result<PageGeometry> {
    let ops = backend.operations(page)?;
    let decode = backend.text_decoder(page);
    Ok(interpret(&ops, |font, bytes| decode(font, bytes)))
}

/// Run the content-stream interpreter over decoded operations.
///
/// `decode` maps (font resource name, string bytes) to text.
pub fn interpret<F>(ops: &[Operation], decode: F) -> PageGeometry
where
    F: Fn(&[u8], &[u8]) -> String,
{
    let mut state = Interpreter::default();
    for op in ops {
        state.apply(op, &decode);
    }
    log::debug!(
        "layout: {} spans, {} rulings",
        state.geometry.spans.len(),
        state.geometry.rulings.len()
    );
    state.geometry
}

/// Affine transform in PDF row-vector convention: `p' = p × M`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::translate(0.0, 0.0)
    }
}

impl Matrix {
    fn from_op(op: &Operation) -> Option<Self> {
        Some(Self {
            a: op.number(0)?,
            b: op.number(1)?,
            c: op.number(2)?,
            d: op.number(3)?,
            e: op.number(4)?,
            f: op.number(5)?,
        })
    }

    fn translate(tx: f32, ty: f32) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: tx,
            f: ty,
        }
    }

    /// `self × other`
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Vertical scale factor.
    fn scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

#[derive(Default)]
struct Interpreter {
    geometry: PageGeometry,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f32,
    font_name: Vec<u8>,
    font_size: f32,
    in_text: bool,
    subpath_start: Option<(f32, f32)>,
    cursor: Option<(f32, f32)>,
    pending: Vec<Ruling>,
}

impl Interpreter {
    fn apply<F>(&mut self, op: &Operation, decode: &F)
    where
        F: Fn(&[u8], &[u8]) -> String,
    {
        match op.operator.as_str() {
            // graphics state
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(m) = self.ctm_stack.pop() {
                    self.ctm = m;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_op(op) {
                    self.ctm = m.then(&self.ctm);
                }
            }

            // text objects and state
            "BT" => {
                self.in_text = true;
                self.text_matrix = Matrix::default();
                self.line_matrix = Matrix::default();
            }
            "ET" => self.in_text = false,
            "Tf" => {
                if let Some(Operand::Name(name)) = op.operands.first() {
                    self.font_name = name.clone();
                }
                self.font_size = op.number(1).unwrap_or(12.0);
            }
            "TL" => self.leading = op.number(0).unwrap_or(0.0),
            "Td" => self.move_line(op.number(0), op.number(1)),
            "TD" => {
                self.leading = -op.number(1).unwrap_or(0.0);
                self.move_line(op.number(0), op.number(1));
            }
            "Tm" => {
                if let Some(m) = Matrix::from_op(op) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),

            // text showing
            "Tj" => {
                if let Some(Operand::Str(bytes)) = op.operands.first() {
                    let text = decode(&self.font_name, bytes);
                    self.show(text);
                }
            }
            "TJ" => {
                if let Some(Operand::Array(items)) = op.operands.first() {
                    let text = self.combine_tj(items, decode);
                    self.show(text);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Operand::Str(bytes)) = op.operands.first() {
                    let text = decode(&self.font_name, bytes);
                    self.show(text);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(Operand::Str(bytes)) = op.operands.get(2) {
                    let text = decode(&self.font_name, bytes);
                    self.show(text);
                }
            }

            // path construction
            "m" => {
                if let (Some(x), Some(y)) = (op.number(0), op.number(1)) {
                    let p = self.ctm.apply(x, y);
                    self.subpath_start = Some(p);
                    self.cursor = Some(p);
                }
            }
            "l" => {
                if let (Some(x), Some(y)) = (op.number(0), op.number(1)) {
                    let p = self.ctm.apply(x, y);
                    if let Some(from) = self.cursor {
                        self.pending.extend(Ruling::from_points(from, p));
                    }
                    self.cursor = Some(p);
                }
            }
            "h" => self.close_subpath(),
            "re" => {
                if let (Some(x), Some(y), Some(w), Some(h)) =
                    (op.number(0), op.number(1), op.number(2), op.number(3))
                {
                    self.rectangle(x, y, w, h);
                }
            }

            // path painting
            "S" | "f" | "F" | "f*" | "B" | "B*" => self.commit_path(),
            "s" | "b" | "b*" => {
                self.close_subpath();
                self.commit_path();
            }
            "n" => self.discard_path(),

            _ => {}
        }
    }

    fn move_line(&mut self, tx: Option<f32>, ty: Option<f32>) {
        let t = Matrix::translate(tx.unwrap_or(0.0), ty.unwrap_or(0.0));
        self.line_matrix = t.then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size
        };
        self.move_line(Some(0.0), Some(-leading));
    }

    /// Concatenate a TJ array, inserting a space for large negative kerning.
    fn combine_tj<F>(&self, items: &[Operand], decode: &F) -> String
    where
        F: Fn(&[u8], &[u8]) -> String,
    {
        // 1/1000 text space units; ~ a quarter em reads as a word gap
        let space_threshold = 250.0;
        let mut combined = String::new();

        for item in items {
            match item {
                Operand::Str(bytes) => combined.push_str(&decode(&self.font_name, bytes)),
                Operand::Integer(_) | Operand::Real(_) => {
                    let adjustment = -item.as_number().unwrap_or(0.0);
                    if adjustment > space_threshold
                        && !combined.is_empty()
                        && !combined.ends_with(char::is_whitespace)
                    {
                        combined.push(' ');
                    }
                }
                _ => {}
            }
        }

        combined
    }

    fn show(&mut self, text: String) {
        if !self.in_text {
            return;
        }

        let chars = text.chars().count() as f32;
        let rendering = self.text_matrix.then(&self.ctm);

        if !text.trim().is_empty() {
            let (x, y) = rendering.apply(0.0, 0.0);
            let size = self.font_size * rendering.scale();
            self.geometry.spans.push(TextSpan::new(text, x, y, size));
        }

        // Advance past the shown glyphs so consecutive Tj do not overlap.
        let advance = chars * self.font_size * AVG_GLYPH_WIDTH;
        self.text_matrix = Matrix::translate(advance, 0.0).then(&self.text_matrix);
    }

    fn rectangle(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let corners = [
            self.ctm.apply(x, y),
            self.ctm.apply(x + w, y),
            self.ctm.apply(x + w, y + h),
            self.ctm.apply(x, y + h),
        ];

        // A hairline rectangle is drawn as a filled rule.
        let (min_x, max_x) = (corners[0].0.min(corners[2].0), corners[0].0.max(corners[2].0));
        let (min_y, max_y) = (corners[0].1.min(corners[2].1), corners[0].1.max(corners[2].1));
        if max_y - min_y <= 2.0 * AXIS_TOLERANCE + 1.0 {
            let mid = (min_y + max_y) / 2.0;
            self.pending
                .extend(Ruling::from_points((min_x, mid), (max_x, mid)));
        } else if max_x - min_x <= 2.0 * AXIS_TOLERANCE + 1.0 {
            let mid = (min_x + max_x) / 2.0;
            self.pending
                .extend(Ruling::from_points((mid, min_y), (mid, max_y)));
        } else {
            for i in 0..4 {
                self.pending
                    .extend(Ruling::from_points(corners[i], corners[(i + 1) % 4]));
            }
        }

        self.subpath_start = Some(corners[0]);
        self.cursor = Some(corners[0]);
    }

    fn close_subpath(&mut self) {
        if let (Some(from), Some(start)) = (self.cursor, self.subpath_start) {
            self.pending.extend(Ruling::from_points(from, start));
            self.cursor = Some(start);
        }
    }

    fn commit_path(&mut self) {
        self.geometry.rulings.append(&mut self.pending);
        self.subpath_start = None;
        self.cursor = None;
    }

    fn discard_path(&mut self) {
        self.pending.clear();
        self.subpath_start = None;
        self.cursor = None;
    }
}

/// Decode helper for tests and backends without font encodings.
pub fn decode_plain(_font: &[u8], bytes: &[u8]) -> String {
    decode_unmapped(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: f32) -> Operand {
        Operand::Real(v)
    }

    fn op(operator: &str, operands: Vec<Operand>) -> Operation {
        Operation::new(operator, operands)
    }

    fn text_ops(text: &str, x: f32, y: f32) -> Vec<Operation> {
        vec![
            op("BT", vec![]),
            op("Tf", vec![Operand::Name(b"F1".to_vec()), num(10.0)]),
            op("Td", vec![num(x), num(y)]),
            op("Tj", vec![Operand::Str(text.as_bytes().to_vec())]),
            op("ET", vec![]),
        ]
    }

    #[test]
    fn test_text_position_from_td() {
        let geometry = interpret(&text_ops("אלון", 100.0, 700.0), decode_plain);
        assert_eq!(geometry.spans.len(), 1);
        let span = &geometry.spans[0];
        assert_eq!(span.text, "אלון");
        assert_eq!((span.x, span.y), (100.0, 700.0));
        assert_eq!(span.font_size, 10.0);
    }

    #[test]
    fn test_ctm_applies_to_text_and_paths() {
        let mut ops = vec![
            op("q", vec![]),
            op("cm", vec![num(1.0), num(0.0), num(0.0), num(1.0), num(50.0), num(20.0)]),
        ];
        ops.extend(text_ops("x", 10.0, 10.0));
        ops.push(op("m", vec![num(0.0), num(0.0)]));
        ops.push(op("l", vec![num(100.0), num(0.0)]));
        ops.push(op("S", vec![]));
        ops.push(op("Q", vec![]));
        ops.extend(text_ops("y", 10.0, 10.0));

        let geometry = interpret(&ops, decode_plain);
        assert_eq!((geometry.spans[0].x, geometry.spans[0].y), (60.0, 30.0));
        assert_eq!((geometry.spans[1].x, geometry.spans[1].y), (10.0, 10.0));
        assert_eq!(
            geometry.rulings,
            vec![Ruling::Horizontal {
                y: 20.0,
                x0: 50.0,
                x1: 150.0
            }]
        );
    }

    #[test]
    fn test_rectangle_edges() {
        let ops = vec![
            op("re", vec![num(10.0), num(10.0), num(100.0), num(50.0)]),
            op("S", vec![]),
        ];
        let geometry = interpret(&ops, decode_plain);
        assert_eq!(geometry.rulings.len(), 4);
        let horizontals = geometry
            .rulings
            .iter()
            .filter(|r| matches!(r, Ruling::Horizontal { .. }))
            .count();
        assert_eq!(horizontals, 2);
    }

    #[test]
    fn test_hairline_rectangle_is_single_rule() {
        let ops = vec![
            op("re", vec![num(10.0), num(100.0), num(200.0), num(0.5)]),
            op("f", vec![]),
        ];
        let geometry = interpret(&ops, decode_plain);
        assert_eq!(geometry.rulings.len(), 1);
        assert!(matches!(geometry.rulings[0], Ruling::Horizontal { .. }));
    }

    #[test]
    fn test_discarded_path_leaves_no_rulings() {
        let ops = vec![
            op("re", vec![num(0.0), num(0.0), num(10.0), num(10.0)]),
            op("W", vec![]),
            op("n", vec![]),
        ];
        assert!(interpret(&ops, decode_plain).rulings.is_empty());
    }

    #[test]
    fn test_tj_kerning_inserts_space() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Operand::Name(b"F1".to_vec()), num(10.0)]),
            op(
                "TJ",
                vec![Operand::Array(vec![
                    Operand::Str(b"Oak".to_vec()),
                    Operand::Integer(-400),
                    Operand::Str(b"tree".to_vec()),
                    Operand::Integer(-20),
                    Operand::Str(b"s".to_vec()),
                ])],
            ),
            op("ET", vec![]),
        ];
        let geometry = interpret(&ops, decode_plain);
        assert_eq!(geometry.spans[0].text, "Oak trees");
    }

    #[test]
    fn test_next_line_uses_leading() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Operand::Name(b"F1".to_vec()), num(10.0)]),
            op("TL", vec![num(14.0)]),
            op("Td", vec![num(0.0), num(100.0)]),
            op("'", vec![Operand::Str(b"a".to_vec())]),
            op("ET", vec![]),
        ];
        let geometry = interpret(&ops, decode_plain);
        assert_eq!(geometry.spans[0].y, 86.0);
    }

    #[test]
    fn test_ruling_touches() {
        let h = Ruling::Horizontal {
            y: 100.0,
            x0: 0.0,
            x1: 50.0,
        };
        let v = Ruling::Vertical {
            x: 50.0,
            y0: 100.0,
            y1: 200.0,
        };
        let far = Ruling::Vertical {
            x: 80.0,
            y0: 0.0,
            y1: 200.0,
        };
        assert!(h.touches(&v, 1.0));
        assert!(!h.touches(&far, 1.0));
    }
}
