//! Access to the PDF object model.
//!
//! Geometry extraction needs three things from a page: its content-stream
//! operations, a way to turn string operands into text, and its media box.
//! [`PdfBackend`] names exactly those; [`LopdfBackend`] provides them over
//! lopdf so the interpreter in [`super::layout`] never touches lopdf types.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Dictionary, Document as LopdfDocument, Object};

use crate::error::{Error, Result};

/// Page identifier: (object number, generation number).
pub type PageId = (u32, u16);

/// Maps (font resource name, string operand bytes) to text.
pub type TextDecoder<'a> = Box<dyn Fn(&[u8], &[u8]) -> String + 'a>;

/// Operand of a content-stream operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<Operand>),
    Other,
}

impl Operand {
    /// Numeric value, for integer and real operands.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Operand::Integer(i) => Some(*i as f32),
            Operand::Real(r) => Some(*r),
            _ => None,
        }
    }
}

/// One operator with its operands, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Operand>,
}

impl Operation {
    pub fn new(operator: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self {
            operator: operator.into(),
            operands,
        }
    }

    /// Operand `i` as a number.
    pub fn number(&self, i: usize) -> Option<f32> {
        self.operands.get(i).and_then(Operand::as_number)
    }
}

/// The page-level PDF access geometry extraction relies on.
pub trait PdfBackend {
    /// Pages by 1-based number.
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Decoded content-stream operations of a page, all streams concatenated.
    fn operations(&self, page: PageId) -> Result<Vec<Operation>>;

    /// Text decoder for a page's fonts; unknown fonts use [`decode_unmapped`].
    fn text_decoder(&self, page: PageId) -> TextDecoder<'_>;

    /// `[x0, y0, x1, y1]`, inherited from the page tree when the page has none.
    fn media_box(&self, page: PageId) -> Option<[f32; 4]>;
}

/// Decode string bytes without a font encoding: UTF-16BE with BOM, then
/// UTF-8, then Latin-1.
pub fn decode_unmapped(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Page tree depth beyond which inheritance lookups give up.
const MAX_TREE_DEPTH: usize = 32;

/// [`PdfBackend`] over an in-memory `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
}

impl LopdfBackend {
    /// Parse a document from bytes.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data)?;
        Ok(Self { doc })
    }

    /// The underlying document, for the info dictionary.
    pub fn raw_doc(&self) -> &LopdfDocument {
        &self.doc
    }

    pub fn is_encrypted(&self) -> bool {
        self.doc.is_encrypted()
    }

    fn stream_bytes(&self, object: &Object) -> Option<Vec<u8>> {
        let Object::Reference(id) = object else {
            return None;
        };
        match self.doc.get_object(*id) {
            // Unfiltered streams have nothing to decompress.
            Ok(Object::Stream(s)) => {
                Some(s.decompressed_content().unwrap_or_else(|_| s.content.clone()))
            }
            _ => None,
        }
    }

    /// Look `key` up on the page, then on its ancestors.
    fn inherited<'a>(&'a self, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        let mut node = page;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(value);
            }
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn operations(&self, page: PageId) -> Result<Vec<Operation>> {
        let dict = self.doc.get_dictionary(page)?;
        let contents = dict
            .get(b"Contents")
            .map_err(|_| Error::PdfParse("page has no /Contents".to_string()))?;

        let data = match contents {
            Object::Array(parts) => {
                let mut data = Vec::new();
                for part in parts.iter().filter_map(|p| self.stream_bytes(p)) {
                    data.extend_from_slice(&part);
                    data.push(b'\n');
                }
                data
            }
            single => self
                .stream_bytes(single)
                .ok_or_else(|| Error::PdfParse("/Contents is not a stream".to_string()))?,
        };

        let content = lopdf::content::Content::decode(&data)?;
        Ok(content
            .operations
            .into_iter()
            .map(|op| Operation::new(op.operator, op.operands.iter().map(to_operand).collect()))
            .collect())
    }

    fn text_decoder(&self, page: PageId) -> TextDecoder<'_> {
        let encodings: HashMap<Vec<u8>, _> = self
            .doc
            .get_page_fonts(page)
            .map(|fonts| {
                fonts
                    .into_iter()
                    .filter_map(|(name, font)| {
                        font.get_font_encoding(&self.doc).ok().map(|enc| (name, enc))
                    })
                    .collect()
            })
            .unwrap_or_default();
        log::trace!("page {:?}: {} font encodings", page, encodings.len());

        Box::new(move |font: &[u8], bytes: &[u8]| {
            encodings
                .get(font)
                .and_then(|enc| LopdfDocument::decode_text(enc, bytes).ok())
                .unwrap_or_else(|| decode_unmapped(bytes))
        })
    }

    fn media_box(&self, page: PageId) -> Option<[f32; 4]> {
        let dict = self.doc.get_dictionary(page).ok()?;
        let values = self.inherited(dict, b"MediaBox")?.as_array().ok()?;
        match values.as_slice() {
            [x0, y0, x1, y1, ..] => Some([
                x0.as_float().ok()?,
                y0.as_float().ok()?,
                x1.as_float().ok()?,
                y1.as_float().ok()?,
            ]),
            _ => None,
        }
    }
}

fn to_operand(object: &Object) -> Operand {
    match object {
        Object::Integer(i) => Operand::Integer(*i),
        Object::Real(r) => Operand::Real(*r),
        Object::Name(n) => Operand::Name(n.clone()),
        Object::String(bytes, _) => Operand::Str(bytes.clone()),
        Object::Array(items) => Operand::Array(items.iter().map(to_operand).collect()),
        _ => Operand::Other,
    }
}
