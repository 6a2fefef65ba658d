//! Content drawn on top of existing pages: watermarks, page numbers, edits,
//! visual signatures and the OCR placeholder layer.

use chrono::Utc;
use lopdf::{Document, ObjectId};
use tracing::{debug, warn};

use crate::command::{
    EditParams, NumberPagesParams, NumberPosition, OcrParams, ShapeKind, SignParams,
    WatermarkParams, WatermarkPosition,
};
use crate::document::{self, parse_hex_color, text_width, Canvas};
use crate::error::PdfToolsError;

const PAGE_NUMBER_MARGIN: f32 = 50.0;
const PAGE_NUMBER_BOTTOM: f32 = 30.0;
const WATERMARK_GRAY: (f32, f32, f32) = (0.7, 0.7, 0.7);

pub const SIGN_NOTICE: &str = "This is a visual signature only; the document is not \
     cryptographically signed";

pub const OCR_NOTICE: &str = "Text recognition is not performed: an invisible placeholder text \
     layer was added, and scanned content is not made searchable";

/// Map a font family plus style flags onto one of the standard 14 fonts.
pub fn standard_font(family: Option<&str>, bold: bool, italic: bool) -> &'static str {
    let lower = family.unwrap_or_default().to_lowercase();
    let base = match lower.as_str() {
        "serif" => "Times",
        "monospace" => "Courier",
        _ if lower.contains("times")
            || lower.contains("georgia")
            || lower.contains("garamond") =>
        {
            "Times"
        }
        _ if lower.contains("courier")
            || lower.contains("mono")
            || lower.contains("consolas")
            || lower.contains("monaco") =>
        {
            "Courier"
        }
        _ => "Helvetica",
    };

    match base {
        "Times" => match (bold, italic) {
            (true, true) => "Times-BoldItalic",
            (true, false) => "Times-Bold",
            (false, true) => "Times-Italic",
            (false, false) => "Times-Roman",
        },
        "Courier" => match (bold, italic) {
            (true, true) => "Courier-BoldOblique",
            (true, false) => "Courier-Bold",
            (false, true) => "Courier-Oblique",
            (false, false) => "Courier",
        },
        _ => match (bold, italic) {
            (true, true) => "Helvetica-BoldOblique",
            (true, false) => "Helvetica-Bold",
            (false, true) => "Helvetica-Oblique",
            (false, false) => "Helvetica",
        },
    }
}

/// Origin and size of the visible page area
fn page_frame(doc: &Document, page_id: ObjectId) -> (f32, f32, f32, f32) {
    let [x0, y0, x1, y1] = document::media_box(doc, page_id);
    (x0, y0, x1 - x0, y1 - y0)
}

pub fn watermark_document(
    bytes: &[u8],
    params: &WatermarkParams,
) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc = document::load(bytes)?;
    let size = params.font_size;
    let text_w = text_width(&params.text, size);

    for page_id in document::page_ids(&doc) {
        let font = document::add_standard_font(&mut doc, page_id, "Helvetica")?;
        let state = document::add_opacity(&mut doc, page_id, params.opacity)?;
        let (x0, y0, width, height) = page_frame(&doc, page_id);
        let (cx, cy) = (x0 + width / 2.0, y0 + height / 2.0);

        let mut canvas = Canvas::new();
        canvas
            .save()
            .graphics_state(&state)
            .fill_color(WATERMARK_GRAY);
        match params.position {
            WatermarkPosition::Center => {
                canvas.text(&font, size, cx - text_w / 2.0, cy, &params.text);
            }
            WatermarkPosition::Diagonal => {
                let (sin, cos) = 45f32.to_radians().sin_cos();
                let x = cx - text_w / 2.0 * cos;
                let y = cy - text_w / 2.0 * sin;
                canvas.rotated_text(&font, size, x, y, 45.0, &params.text);
            }
        }
        canvas.restore();
        document::append_content(&mut doc, page_id, canvas.into_operations())?;
    }

    document::save(&mut doc)
}

pub fn number_pages(bytes: &[u8], params: &NumberPagesParams) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc = document::load(bytes)?;
    let page_ids = document::page_ids(&doc);
    let total = page_ids.len();
    let size = params.font_size;
    let skip = usize::try_from(params.start_page - 1).unwrap_or(0);

    for (index, page_id) in page_ids.into_iter().enumerate().skip(skip) {
        let label = params
            .format
            .replace("{n}", &(index + 1).to_string())
            .replace("{total}", &total.to_string());
        let label_w = text_width(&label, size);
        let (x0, y0, width, height) = page_frame(&doc, page_id);

        let x = match params.position {
            NumberPosition::BottomLeft | NumberPosition::TopLeft => PAGE_NUMBER_MARGIN,
            NumberPosition::BottomCenter | NumberPosition::TopCenter => (width - label_w) / 2.0,
            NumberPosition::BottomRight | NumberPosition::TopRight => {
                width - label_w - PAGE_NUMBER_MARGIN
            }
        };
        let y = match params.position {
            NumberPosition::BottomLeft
            | NumberPosition::BottomCenter
            | NumberPosition::BottomRight => PAGE_NUMBER_BOTTOM,
            _ => height - PAGE_NUMBER_MARGIN,
        };

        let font = document::add_standard_font(&mut doc, page_id, "Helvetica")?;
        let mut canvas = Canvas::new();
        canvas
            .fill_color((0.0, 0.0, 0.0))
            .text(&font, size, x0 + x, y0 + y, &label);
        document::append_content(&mut doc, page_id, canvas.into_operations())?;
    }

    document::save(&mut doc)
}

/// Add text and shapes to one page. Input coordinates have their origin at
/// the top left of the page, as a browser would report them.
pub fn edit_document(bytes: &[u8], params: &EditParams) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc = document::load(bytes)?;
    let page_id = document::page_id(&doc, params.page)?;
    let (x0, y0, _, height) = page_frame(&doc, page_id);
    let top = y0 + height;

    let mut canvas = Canvas::new();
    for shape in &params.shapes {
        let color = parse_hex_color(shape.color.as_deref().unwrap_or("#000000"));
        let (x, y) = (x0 + shape.x, top - shape.y - shape.height);
        canvas.save().stroke_color(color).line_width(1.0);
        if shape.filled {
            canvas.fill_color(color);
        }
        match shape.kind {
            ShapeKind::Rectangle => canvas.rect(x, y, shape.width, shape.height),
            ShapeKind::Circle => canvas.ellipse(x, y, shape.width, shape.height),
        };
        if shape.filled {
            canvas.fill_stroke();
        } else {
            canvas.stroke();
        }
        canvas.restore();
    }

    for item in &params.text {
        let base = standard_font(item.font_family.as_deref(), item.bold, item.italic);
        let font = document::add_standard_font(&mut doc, page_id, base)?;
        let color = parse_hex_color(item.color.as_deref().unwrap_or("#000000"));
        canvas
            .save()
            .fill_color(color)
            .text(&font, item.size, x0 + item.x, top - item.y, &item.content)
            .restore();
    }
    debug!(
        "Editing page {}: {} text items, {} shapes",
        params.page,
        params.text.len(),
        params.shapes.len()
    );

    document::append_content(&mut doc, page_id, canvas.into_operations())?;
    document::save(&mut doc)
}

pub fn sign_document(bytes: &[u8], params: &SignParams) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc = document::load(bytes)?;
    let page_id = document::page_id(&doc, params.page)?;
    let (x0, y0, width, _) = page_frame(&doc, page_id);

    let (x, y) = match params.position {
        Some(p) => (x0 + p.x, y0 + p.y),
        None => (x0 + width - 200.0, y0 + 100.0),
    };
    let date = format!("Date: {}", Utc::now().format("%Y-%m-%d"));

    let bold = document::add_standard_font(&mut doc, page_id, "Helvetica-Bold")?;
    let regular = document::add_standard_font(&mut doc, page_id, "Helvetica")?;

    let mut canvas = Canvas::new();
    canvas
        .save()
        .fill_color((0.95, 0.95, 0.95))
        .stroke_color((0.5, 0.5, 0.5))
        .line_width(1.0)
        .rect(x - 10.0, y - 30.0, 180.0, 50.0)
        .fill_stroke()
        .fill_color((0.0, 0.0, 0.0))
        .text(&bold, 14.0, x, y, &params.signature_text)
        .fill_color((0.3, 0.3, 0.3))
        .text(&regular, 8.0, x, y - 20.0, &date)
        .restore();

    document::append_content(&mut doc, page_id, canvas.into_operations())?;
    document::save(&mut doc)
}

pub fn ocr_document(bytes: &[u8], params: &OcrParams) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc = document::load(bytes)?;
    warn!(
        "OCR requested (language {}); adding placeholder text layer only",
        params.language
    );

    for page_id in document::page_ids(&doc) {
        let font = document::add_standard_font(&mut doc, page_id, "Helvetica")?;
        let (x0, y0, _, height) = page_frame(&doc, page_id);
        let mut canvas = Canvas::new();
        canvas.invisible_text(
            &font,
            10.0,
            x0 + 50.0,
            y0 + height - 50.0,
            "[OCR placeholder: text recognition not performed]",
        );
        document::append_content(&mut doc, page_id, canvas.into_operations())?;
    }

    document::save(&mut doc)
}
