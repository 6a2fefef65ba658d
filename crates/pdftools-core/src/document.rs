//! Shared lopdf plumbing: loading, saving, page geometry, resources and
//! content overlays.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::PdfToolsError;

/// US Letter, the fallback when a page declares no usable MediaBox
pub const LETTER: (f32, f32) = (612.0, 792.0);

/// Largest page dimension the PDF format allows, in points
pub const MAX_PAGE_DIMENSION: f32 = 14400.0;

const MAX_TREE_DEPTH: usize = 32;

/// Attributes a page may inherit from its ancestors in the page tree
pub const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

pub fn load(bytes: &[u8]) -> Result<Document, PdfToolsError> {
    if bytes.is_empty() {
        return Err(PdfToolsError::ParseError("Input file is empty".into()));
    }
    Document::load_mem(bytes).map_err(|e| PdfToolsError::ParseError(e.to_string()))
}

pub fn save(doc: &mut Document) -> Result<Vec<u8>, PdfToolsError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfToolsError::OperationError(format!("Failed to save PDF: {}", e)))?;
    Ok(buffer)
}

pub fn is_encrypted(doc: &Document) -> bool {
    doc.trailer.get(b"Encrypt").is_ok()
}

/// Page object ids in document order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Look up a 1-indexed page, reporting the page count when it is missing.
pub fn page_id(doc: &Document, page: i64) -> Result<ObjectId, PdfToolsError> {
    let pages = doc.get_pages();
    u32::try_from(page)
        .ok()
        .and_then(|p| pages.get(&p).copied())
        .ok_or_else(|| {
            PdfToolsError::InvalidRange(format!(
                "Page {} does not exist in the PDF (total pages: {})",
                page,
                pages.len()
            ))
        })
}

pub fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Find `key` on the page or the nearest ancestor that defines it.
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Parse a rectangle array into `[llx, lly, urx, ury]`.
pub fn rect(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let items = resolve(doc, obj).as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = number(resolve(doc, item))?;
    }
    Some(out)
}

/// Effective MediaBox of a page, falling back to US Letter.
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| rect(doc, obj))
        .unwrap_or([0.0, 0.0, LETTER.0, LETTER.1])
}

/// Width and height of a page in points
pub fn page_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let [x0, y0, x1, y1] = media_box(doc, page_id);
    ((x1 - x0).abs(), (y1 - y0).abs())
}

pub fn rect_object(r: [f32; 4]) -> Object {
    Object::Array(r.iter().map(|v| Object::Real(*v)).collect())
}

/// Copy inherited attributes onto the page so it no longer depends on its
/// current ancestors.
pub fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> Result<(), PdfToolsError> {
    let mut missing = Vec::new();
    {
        let page = doc.get_dictionary(page_id)?;
        for key in INHERITABLE {
            if !page.has(key) {
                if let Some(value) = inherited(doc, page_id, key) {
                    missing.push((key.to_vec(), value.clone()));
                }
            }
        }
    }
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in missing {
        page.set(key, value);
    }
    Ok(())
}

fn owned_dict(doc: &Document, obj: Option<&Object>) -> Dictionary {
    match obj.map(|o| resolve(doc, o)) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

/// Add `value` under a fresh name in the page's `category` resources
/// (`Font`, `ExtGState`, `XObject`) and return the name.
pub fn register_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &str,
    prefix: &str,
    value: Object,
) -> Result<String, PdfToolsError> {
    let mut resources = owned_dict(doc, inherited(doc, page_id, b"Resources"));
    let mut entries = owned_dict(doc, resources.get(category.as_bytes()).ok());

    let mut n = 1;
    let name = loop {
        let candidate = format!("{}{}", prefix, n);
        if !entries.has(candidate.as_bytes()) {
            break candidate;
        }
        n += 1;
    };

    entries.set(name.clone(), value);
    resources.set(category, Object::Dictionary(entries));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(name)
}

/// Register one of the 14 standard fonts on the page.
pub fn add_standard_font(
    doc: &mut Document,
    page_id: ObjectId,
    base_font: &str,
) -> Result<String, PdfToolsError> {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    });
    register_resource(doc, page_id, "Font", "PTF", Object::Reference(font_id))
}

/// Register a graphics state with the given fill/stroke opacity.
pub fn add_opacity(
    doc: &mut Document,
    page_id: ObjectId,
    opacity: f32,
) -> Result<String, PdfToolsError> {
    let state = dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(opacity),
        "CA" => Object::Real(opacity),
    };
    register_resource(doc, page_id, "ExtGState", "PTGS", Object::Dictionary(state))
}

/// Draw `operations` on top of the page's existing content. The original
/// content is wrapped in q/Q so its graphics state cannot leak into ours.
pub fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), PdfToolsError> {
    let existing = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut overlay = b"Q\n".to_vec();
    overlay.extend(Content { operations }.encode()?);

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}

/// Encode text for a WinAnsi standard font. Characters outside Latin-1
/// render as `?`.
pub fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u8,
            '\t' => b' ',
            _ => b'?',
        })
        .collect()
}

/// Approximate rendered width for Helvetica-like fonts.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5
}

/// Small builder for content-stream operations.
#[derive(Default)]
pub struct Canvas {
    ops: Vec<Operation>,
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    fn op(&mut self, operator: &str, operands: Vec<Object>) -> &mut Self {
        self.ops.push(Operation::new(operator, operands));
        self
    }

    pub fn save(&mut self) -> &mut Self {
        self.op("q", vec![])
    }

    pub fn restore(&mut self) -> &mut Self {
        self.op("Q", vec![])
    }

    pub fn graphics_state(&mut self, name: &str) -> &mut Self {
        self.op("gs", vec![Object::Name(name.as_bytes().to_vec())])
    }

    pub fn fill_color(&mut self, (r, g, b): (f32, f32, f32)) -> &mut Self {
        self.op("rg", vec![real(r), real(g), real(b)])
    }

    pub fn stroke_color(&mut self, (r, g, b): (f32, f32, f32)) -> &mut Self {
        self.op("RG", vec![real(r), real(g), real(b)])
    }

    pub fn line_width(&mut self, width: f32) -> &mut Self {
        self.op("w", vec![real(width)])
    }

    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.op("re", vec![real(x), real(y), real(width), real(height)])
    }

    /// Ellipse inscribed in the given box, built from four Bezier arcs.
    pub fn ellipse(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        const KAPPA: f32 = 0.552_284_8;
        let (rx, ry) = (width / 2.0, height / 2.0);
        let (cx, cy) = (x + rx, y + ry);
        let (ox, oy) = (rx * KAPPA, ry * KAPPA);
        self.op("m", vec![real(cx + rx), real(cy)]);
        self.op(
            "c",
            vec![real(cx + rx), real(cy + oy), real(cx + ox), real(cy + ry), real(cx), real(cy + ry)],
        );
        self.op(
            "c",
            vec![real(cx - ox), real(cy + ry), real(cx - rx), real(cy + oy), real(cx - rx), real(cy)],
        );
        self.op(
            "c",
            vec![real(cx - rx), real(cy - oy), real(cx - ox), real(cy - ry), real(cx), real(cy - ry)],
        );
        self.op(
            "c",
            vec![real(cx + ox), real(cy - ry), real(cx + rx), real(cy - oy), real(cx + rx), real(cy)],
        );
        self.op("h", vec![])
    }

    pub fn fill(&mut self) -> &mut Self {
        self.op("f", vec![])
    }

    pub fn stroke(&mut self) -> &mut Self {
        self.op("S", vec![])
    }

    pub fn fill_stroke(&mut self) -> &mut Self {
        self.op("B", vec![])
    }

    pub fn image(&mut self, name: &str, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.save();
        self.op(
            "cm",
            vec![real(width), real(0.0), real(0.0), real(height), real(x), real(y)],
        );
        self.op("Do", vec![Object::Name(name.as_bytes().to_vec())]);
        self.restore()
    }

    /// Single line of text with its baseline at (x, y).
    pub fn text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) -> &mut Self {
        self.begin_text(font, size);
        self.op("Td", vec![real(x), real(y)]);
        self.show(text);
        self.end_text()
    }

    /// Text drawn along a rotated baseline starting at (x, y).
    pub fn rotated_text(
        &mut self,
        font: &str,
        size: f32,
        x: f32,
        y: f32,
        degrees: f32,
        text: &str,
    ) -> &mut Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        self.begin_text(font, size);
        self.op("Tm", vec![real(cos), real(sin), real(-sin), real(cos), real(x), real(y)]);
        self.show(text);
        self.end_text()
    }

    /// Text that is laid out but not painted (render mode 3).
    pub fn invisible_text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) -> &mut Self {
        self.begin_text(font, size);
        self.op("Tr", vec![Object::Integer(3)]);
        self.op("Td", vec![real(x), real(y)]);
        self.show(text);
        self.end_text()
    }

    pub fn begin_text(&mut self, font: &str, size: f32) -> &mut Self {
        self.op("BT", vec![]);
        self.set_font(font, size)
    }

    pub fn set_font(&mut self, font: &str, size: f32) -> &mut Self {
        self.op("Tf", vec![Object::Name(font.as_bytes().to_vec()), real(size)])
    }

    pub fn move_text(&mut self, x: f32, y: f32) -> &mut Self {
        self.op("Td", vec![real(x), real(y)])
    }

    pub fn show(&mut self, text: &str) -> &mut Self {
        self.op("Tj", vec![Object::String(encode_text(text), StringFormat::Literal)])
    }

    pub fn end_text(&mut self) -> &mut Self {
        self.op("ET", vec![])
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.ops
    }
}

/// Parse `#rrggbb` into RGB components in 0..=1, defaulting to black.
pub fn parse_hex_color(color: &str) -> (f32, f32, f32) {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.is_ascii() {
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).unwrap_or(0) as f32 / 255.0
        };
        (channel(0..2), channel(2..4), channel(4..6))
    } else {
        (0.0, 0.0, 0.0)
    }
}
