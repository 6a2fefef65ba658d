//! Builders for PDFs generated from scratch: flowing text (converters and
//! reports) and full-page images.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::document::{self, Canvas};
use crate::error::PdfToolsError;

pub const LETTER: PageSize = PageSize::new(612.0, 792.0);
pub const A4: PageSize = PageSize::new(595.0, 842.0);
pub const A4_LANDSCAPE: PageSize = PageSize::new(842.0, 595.0);

/// Resource name of the regular text font on generated pages
pub const REGULAR: &str = "F1";
/// Resource name of the bold text font on generated pages
pub const BOLD: &str = "F2";

const LINE_SPACING: f32 = 1.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// A page ready to be assembled
pub struct PageSpec {
    pub size: PageSize,
    pub operations: Vec<Operation>,
    /// Image XObjects used by the page, by resource name
    pub images: Vec<(String, ObjectId)>,
}

/// Assemble pages into a new document. `doc` may already hold objects that
/// the pages reference, such as image streams.
pub fn build_document(mut doc: Document, pages: Vec<PageSpec>) -> Result<Vec<u8>, PdfToolsError> {
    if pages.is_empty() {
        return Err(PdfToolsError::OperationError("Nothing to render".into()));
    }

    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(standard_font("Helvetica"));
    let bold_id = doc.add_object(standard_font("Helvetica-Bold"));

    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let mut xobjects = Dictionary::new();
        for (name, id) in page.images {
            xobjects.set(name, Object::Reference(id));
        }
        let content = Content {
            operations: page.operations,
        }
        .encode()?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => document::rect_object([0.0, 0.0, page.size.width, page.size.height]),
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    REGULAR => regular_id,
                    BOLD => bold_id,
                },
                "XObject" => xobjects,
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    document::save(&mut doc)
}

fn standard_font(base: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// A piece of text with uniform styling
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
}

impl Run {
    pub fn new(text: impl Into<String>, bold: bool) -> Self {
        Self {
            text: text.into(),
            bold,
        }
    }
}

/// Break runs into lines no wider than `max_width`, splitting on whitespace.
/// Words longer than a line are split by character.
pub fn wrap_runs(runs: &[Run], size: f32, max_width: f32) -> Vec<Vec<Run>> {
    let max_chars = ((max_width / (size * 0.5)).floor() as usize).max(1);

    let mut lines: Vec<Vec<Run>> = Vec::new();
    let mut line: Vec<Run> = Vec::new();
    let mut line_chars = 0usize;

    let push_word = |line: &mut Vec<Run>, word: &str, bold: bool| match line.last_mut() {
        Some(last) if last.bold == bold => last.text.push_str(word),
        _ => line.push(Run::new(word, bold)),
    };

    for run in runs {
        for word in run.text.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if line_chars > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_chars = 0;
                }
                let rest = word.split_off(max_chars);
                let chunk: String = word.into_iter().collect();
                push_word(&mut line, &chunk, run.bold);
                lines.push(std::mem::take(&mut line));
                word = rest;
            }
            if word.is_empty() {
                continue;
            }
            let needed = word.len() + usize::from(line_chars > 0);
            if line_chars > 0 && line_chars + needed > max_chars {
                lines.push(std::mem::take(&mut line));
                line_chars = 0;
            }
            let mut text: String = word.iter().collect();
            if line_chars > 0 {
                text.insert(0, ' ');
            }
            line_chars += text.chars().count();
            push_word(&mut line, &text, run.bold);
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Flowing text laid out top to bottom, starting new pages as needed.
pub struct TextDocument {
    size: PageSize,
    margin: f32,
    pages: Vec<Canvas>,
    cursor: f32,
}

impl TextDocument {
    pub fn new(size: PageSize, margin: f32) -> Self {
        Self {
            size,
            margin,
            pages: vec![Canvas::new()],
            cursor: size.height - margin,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.size.width - 2.0 * self.margin
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn new_page(&mut self) {
        self.pages.push(Canvas::new());
        self.cursor = self.size.height - self.margin;
    }

    /// Move the cursor down by `height`, breaking the page when it would
    /// cross the bottom margin. Returns the new baseline.
    fn advance(&mut self, height: f32) -> f32 {
        if self.cursor - height < self.margin {
            self.new_page();
        }
        self.cursor -= height;
        self.cursor
    }

    fn canvas(&mut self) -> &mut Canvas {
        if self.pages.is_empty() {
            self.pages.push(Canvas::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn skip(&mut self, height: f32) {
        self.advance(height);
    }

    /// One line of runs at the left margin, without wrapping.
    pub fn line(&mut self, runs: &[Run], size: f32) {
        let y = self.advance(size * LINE_SPACING);
        let x = self.margin;
        if runs.iter().all(|r| r.text.is_empty()) {
            return;
        }
        let canvas = self.canvas();
        canvas.begin_text(REGULAR, size).move_text(x, y);
        for run in runs {
            canvas
                .set_font(if run.bold { BOLD } else { REGULAR }, size)
                .show(&run.text);
        }
        canvas.end_text();
    }

    /// Wrapped paragraph; an empty paragraph still takes one line.
    pub fn paragraph(&mut self, runs: &[Run], size: f32) {
        let lines = wrap_runs(runs, size, self.content_width());
        if lines.is_empty() {
            self.skip(size * LINE_SPACING);
        }
        for line in lines {
            self.line(&line, size);
        }
    }

    pub fn text(&mut self, text: &str, size: f32, bold: bool) {
        self.paragraph(&[Run::new(text, bold)], size);
    }

    /// One row of cells at fixed column offsets.
    pub fn row(&mut self, cells: &[String], size: f32, column_width: f32, bold: bool) {
        let y = self.advance(size * LINE_SPACING);
        let font = if bold { BOLD } else { REGULAR };
        let margin = self.margin;
        let canvas = self.canvas();
        for (i, cell) in cells.iter().enumerate() {
            if !cell.is_empty() {
                canvas.text(font, size, margin + i as f32 * column_width, y, cell);
            }
        }
    }

    pub fn finish(self) -> Result<Vec<u8>, PdfToolsError> {
        let size = self.size;
        let pages = self
            .pages
            .into_iter()
            .map(|canvas| PageSpec {
                size,
                operations: canvas.into_operations(),
                images: Vec::new(),
            })
            .collect();
        build_document(Document::with_version("1.7"), pages)
    }
}

/// Truncate to `max` characters.
pub fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::page_strings;
    use crate::document::text_width;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wrap_respects_width() {
        let runs = [Run::new("one two three four five six", false)];
        // 12pt at 0.5em per char leaves 10 chars in 60pt
        let lines = wrap_runs(&runs, 12.0, 60.0);
        let texts: Vec<String> = lines
            .iter()
            .map(|l| l.iter().map(|r| r.text.as_str()).collect())
            .collect();
        assert_eq!(texts, vec!["one two", "three four", "five six"]);
        for line in &lines {
            let width: f32 = line.iter().map(|r| text_width(&r.text, 12.0)).sum();
            assert!(width <= 60.0);
        }
    }

    #[test]
    fn test_wrap_keeps_bold_runs_separate() {
        let runs = [Run::new("plain ", false), Run::new("bold", true)];
        let lines = wrap_runs(&runs, 10.0, 500.0);
        assert_eq!(
            lines,
            vec![vec![Run::new("plain", false), Run::new(" bold", true)]]
        );
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let runs = [Run::new("abcdefghijkl", false)];
        let lines = wrap_runs(&runs, 10.0, 25.0);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_text_document_paginates() {
        let mut text = TextDocument::new(LETTER, 50.0);
        for i in 0..100 {
            text.text(&format!("Line {}", i), 12.0, false);
        }
        assert!(text.page_count() > 1);
        let bytes = text.finish().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
        assert_eq!(page_strings(&doc, 1)[0], "Line 0");
    }
}
