//! Office format conversions.
//!
//! Everything here works on plain text: PDFs are converted through their
//! extracted text, and Office files are rendered as flowing text pages.
//! Layout, fonts and images are not carried across in either direction.

use std::io::{Cursor, Read, Seek, Write};

use calamine::{Data, Reader as _};
use lazy_static::lazy_static;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::command::{Artifact, ProcessOutput};
use crate::compare::extract_text;
use crate::document;
use crate::error::PdfToolsError;
use crate::layout::{clip, PageSize, TextDocument, A4, A4_LANDSCAPE};

pub const TEXT_ONLY_NOTICE: &str =
    "Only the text content was converted; layout, fonts and images are not preserved";

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const CSV_MIME: &str = "text/csv";

const MAX_SHEET_ROWS: usize = 50;
const MAX_SHEET_COLUMNS: usize = 8;
const MAX_CELL_CHARS: usize = 15;
const COLUMN_STEP: f32 = 90.0;

lazy_static! {
    /// Two or more spaces, or a tab, separate columns in extracted text
    static ref COLUMN_GAP: Regex = Regex::new(r"\s{2,}|\t").unwrap();
}

fn zip_error(e: zip::result::ZipError) -> PdfToolsError {
    PdfToolsError::OperationError(format!("Archive error: {}", e))
}

fn xml_error(e: quick_xml::Error) -> PdfToolsError {
    PdfToolsError::ParseError(format!("XML parsing error: {}", e))
}

fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04")
}

/// Text of a PDF, failing when the document itself cannot be read.
fn pdf_text(bytes: &[u8]) -> Result<(String, usize), PdfToolsError> {
    let doc = document::load(bytes)?;
    let pages = doc.get_pages().len();
    Ok((extract_text(bytes), pages))
}

// ---------------------------------------------------------------------------
// PDF -> Word
// ---------------------------------------------------------------------------

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// WordprocessingML body with one paragraph per line.
pub fn document_xml<'a>(paragraphs: impl IntoIterator<Item = &'a str>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    );
    for paragraph in paragraphs {
        xml.push_str("<w:p><w:r><w:t xml:space=\"preserve\">");
        xml.push_str(&quick_xml::escape::escape(paragraph));
        xml.push_str("</w:t></w:r></w:p>");
    }
    xml.push_str("</w:body></w:document>");
    xml
}

fn write_docx(paragraphs: &[&str]) -> Result<Vec<u8>, PdfToolsError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("word/document.xml", document_xml(paragraphs.iter().copied())),
    ] {
        zip.start_file(name, options).map_err(zip_error)?;
        zip.write_all(body.as_bytes())
            .map_err(|e| PdfToolsError::OperationError(e.to_string()))?;
    }
    Ok(zip.finish().map_err(zip_error)?.into_inner())
}

pub fn pdf_to_word(bytes: &[u8]) -> Result<ProcessOutput, PdfToolsError> {
    let (text, pages) = pdf_text(bytes)?;
    let mut paragraphs: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let mut output = ProcessOutput::default();
    if paragraphs.is_empty() {
        paragraphs.push("No extractable text was found in the source PDF.");
        output.notices.push(format!(
            "No text could be extracted from the {}-page document; it may be scanned",
            pages
        ));
    }
    debug!("Writing {} paragraphs to DOCX", paragraphs.len());

    let docx = write_docx(&paragraphs)?;
    output.artifacts.push(Artifact::new("converted", "docx", DOCX_MIME, docx));
    output.notices.push(TEXT_ONLY_NOTICE.to_string());
    Ok(output)
}

// ---------------------------------------------------------------------------
// Word -> PDF
// ---------------------------------------------------------------------------

/// Paragraph text of a WordprocessingML body.
pub fn parse_docx_xml(xml: &str) -> Result<Vec<String>, PdfToolsError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => current.push(' '),
                b"br" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Text(e) if in_text => {
                let text = e.unescape().map_err(xml_error)?;
                current.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, PdfToolsError> {
    let mut file = archive.by_name(name).map_err(zip_error)?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| PdfToolsError::ParseError(format!("Failed to read {}: {}", name, e)))?;
    Ok(xml)
}

fn render_paragraphs(paragraphs: &[String], size: PageSize) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc = TextDocument::new(size, 50.0);
    for paragraph in paragraphs {
        doc.text(paragraph, 12.0, false);
    }
    doc.finish()
}

pub fn word_to_pdf(bytes: &[u8]) -> Result<ProcessOutput, PdfToolsError> {
    if !is_zip(bytes) {
        return Err(PdfToolsError::UnsupportedFormat(
            "Only .docx Word documents are supported".into(),
        ));
    }
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;
    let paragraphs = parse_docx_xml(&xml)?;
    if paragraphs.iter().all(|p| p.trim().is_empty()) {
        return Err(PdfToolsError::OperationError(
            "The Word document contains no text".into(),
        ));
    }

    let pdf = render_paragraphs(&paragraphs, A4)?;
    Ok(ProcessOutput::single(Artifact::pdf("word-to-pdf", pdf)).with_notice(TEXT_ONLY_NOTICE))
}

// ---------------------------------------------------------------------------
// PDF -> Excel
// ---------------------------------------------------------------------------

/// Split extracted text into rows of cells on wide gaps.
pub fn text_to_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| COLUMN_GAP.split(line).map(|c| c.trim().to_string()).collect())
        .collect()
}

pub fn pdf_to_excel(bytes: &[u8]) -> Result<ProcessOutput, PdfToolsError> {
    let (text, _) = pdf_text(bytes)?;
    let rows = text_to_rows(&text);

    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
    for row in &rows {
        writer
            .write_record(row)
            .map_err(|e| PdfToolsError::SerializationError(e.to_string()))?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| PdfToolsError::SerializationError(e.to_string()))?;

    let mut output = ProcessOutput::single(Artifact::new("converted", "csv", CSV_MIME, data))
        .with_notice(
            "Tables were reconstructed from extracted text as CSV; column boundaries are \
             approximate and formatting is not preserved",
        );
    if rows.is_empty() {
        output.notices.push("No extractable text was found in the source PDF".into());
    }
    Ok(output)
}

// ---------------------------------------------------------------------------
// Excel -> PDF
// ---------------------------------------------------------------------------

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

/// A worksheet reduced to text cells
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Render sheets as tables, one sheet per page. Returns the PDF and
/// whether any sheet was truncated to fit.
pub fn render_sheets(sheets: &[Sheet]) -> Result<(Vec<u8>, bool), PdfToolsError> {
    let mut doc = TextDocument::new(A4_LANDSCAPE, 30.0);
    let mut truncated = false;

    for (index, sheet) in sheets.iter().enumerate() {
        if index > 0 {
            doc.new_page();
        }
        doc.text(&format!("Sheet: {}", sheet.name), 12.0, true);
        doc.skip(4.0);

        truncated |= sheet.rows.len() > MAX_SHEET_ROWS;
        for row in sheet.rows.iter().take(MAX_SHEET_ROWS) {
            truncated |= row.len() > MAX_SHEET_COLUMNS;
            truncated |= row.iter().any(|c| c.chars().count() > MAX_CELL_CHARS);
            let cells: Vec<String> = row
                .iter()
                .take(MAX_SHEET_COLUMNS)
                .map(|c| clip(c, MAX_CELL_CHARS))
                .collect();
            doc.row(&cells, 10.0, COLUMN_STEP, false);
        }
    }
    Ok((doc.finish()?, truncated))
}

pub fn excel_to_pdf(bytes: &[u8]) -> Result<ProcessOutput, PdfToolsError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
        PdfToolsError::UnsupportedFormat(format!("Could not read spreadsheet: {}", e))
    })?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| PdfToolsError::ParseError(format!("Sheet {}: {}", name, e)))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .collect();
        sheets.push(Sheet { name, rows });
    }
    if sheets.is_empty() {
        return Err(PdfToolsError::OperationError("The workbook has no sheets".into()));
    }

    let (pdf, truncated) = render_sheets(&sheets)?;
    let mut output = ProcessOutput::single(Artifact::pdf("excel-to-pdf", pdf));
    if truncated {
        output.notices.push(format!(
            "Large sheets were truncated to {} rows, {} columns and {} characters per cell",
            MAX_SHEET_ROWS, MAX_SHEET_COLUMNS, MAX_CELL_CHARS
        ));
    }
    Ok(output)
}

// ---------------------------------------------------------------------------
// PowerPoint
// ---------------------------------------------------------------------------

pub fn pdf_to_powerpoint(_bytes: &[u8]) -> Result<ProcessOutput, PdfToolsError> {
    Err(PdfToolsError::UnsupportedFormat(
        "PDF to PowerPoint conversion is not supported".into(),
    ))
}

/// Text paragraphs of one slide (`a:t` runs grouped by `a:p`).
pub fn parse_slide_xml(xml: &str) -> Result<Vec<String>, PdfToolsError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = std::mem::take(&mut current);
                    if !text.trim().is_empty() {
                        paragraphs.push(text);
                    }
                }
                _ => {}
            },
            Event::Text(e) if in_text => current.push_str(&e.unescape().map_err(xml_error)?),
            Event::Eof => break,
            _ => {}
        }
    }
    if !current.trim().is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}

fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

pub fn powerpoint_to_pdf(bytes: &[u8]) -> Result<ProcessOutput, PdfToolsError> {
    if !is_zip(bytes) {
        return Err(PdfToolsError::UnsupportedFormat(
            "Only .pptx presentations are supported".into(),
        ));
    }
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort();
    if slides.is_empty() {
        return Err(PdfToolsError::OperationError(
            "The presentation contains no slides".into(),
        ));
    }

    let mut doc = TextDocument::new(PageSize::new(792.0, 612.0), 50.0);
    for (index, (_, name)) in slides.iter().enumerate() {
        if index > 0 {
            doc.new_page();
        }
        let xml = read_entry(&mut archive, name)?;
        doc.text(&format!("Slide {}", index + 1), 20.0, true);
        doc.skip(10.0);
        for paragraph in parse_slide_xml(&xml)? {
            doc.text(&paragraph, 14.0, false);
        }
    }

    let pdf = doc.finish()?;
    Ok(ProcessOutput::single(Artifact::pdf("powerpoint-to-pdf", pdf)).with_notice(TEXT_ONLY_NOTICE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::{create_test_pdf, page_strings};
    use lopdf::Document;
    use pretty_assertions::assert_eq;

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_parse_docx_paragraphs() {
        let xml = document_xml(["Hello & welcome", "Second"]);
        assert_eq!(
            parse_docx_xml(&xml).unwrap(),
            vec!["Hello & welcome".to_string(), "Second".to_string()]
        );
    }

    #[test]
    fn test_word_to_pdf_renders_paragraphs() {
        let docx = write_docx(&["First paragraph", "Second paragraph"]).unwrap();
        let output = word_to_pdf(&docx).unwrap();
        let doc = Document::load_mem(&output.artifacts[0].bytes).unwrap();
        assert_eq!(
            page_strings(&doc, 1),
            vec!["First paragraph".to_string(), "Second paragraph".to_string()]
        );
        let page = document::page_ids(&doc)[0];
        assert_eq!(document::page_size(&doc, page), (595.0, 842.0));
    }

    #[test]
    fn test_word_to_pdf_rejects_legacy_doc() {
        let err = word_to_pdf(b"\xD0\xCF\x11\xE0legacy").unwrap_err();
        assert!(matches!(err, PdfToolsError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_pdf_to_word_produces_docx() {
        let output = pdf_to_word(&create_test_pdf(1, "W")).unwrap();
        let artifact = &output.artifacts[0];
        assert_eq!(artifact.extension, "docx");
        assert!(output.notices.contains(&TEXT_ONLY_NOTICE.to_string()));

        let mut archive = ZipArchive::new(Cursor::new(artifact.bytes.as_slice())).unwrap();
        let xml = read_entry(&mut archive, "word/document.xml").unwrap();
        assert!(!parse_docx_xml(&xml).unwrap().is_empty());
    }

    #[test]
    fn test_text_to_rows_splits_on_wide_gaps() {
        let rows = text_to_rows("Name    Qty  Price\nWidget  3    9.99\n\n");
        assert_eq!(
            rows,
            vec![
                vec!["Name".to_string(), "Qty".to_string(), "Price".to_string()],
                vec!["Widget".to_string(), "3".to_string(), "9.99".to_string()],
            ]
        );
    }

    #[test]
    fn test_pdf_to_excel_writes_csv() {
        let output = pdf_to_excel(&create_test_pdf(1, "X")).unwrap();
        assert_eq!(output.artifacts[0].extension, "csv");
        assert_eq!(output.artifacts[0].mime_type, "text/csv");
    }

    #[test]
    fn test_render_sheets_truncates_and_reports() {
        let sheets = vec![Sheet {
            name: "Data".into(),
            rows: (0..60)
                .map(|i| vec![format!("row {}", i), "a very long cell value indeed".into()])
                .collect(),
        }];
        let (pdf, truncated) = render_sheets(&sheets).unwrap();
        assert!(truncated);

        let doc = Document::load_mem(&pdf).unwrap();
        let strings = page_strings(&doc, 1);
        assert_eq!(strings[0], "Sheet: Data");
        assert!(strings.contains(&"a very long cel".to_string()));
        assert!(!strings.contains(&"row 50".to_string()));
    }

    #[test]
    fn test_excel_to_pdf_rejects_garbage() {
        assert!(excel_to_pdf(b"not a workbook").is_err());
    }

    #[test]
    fn test_pdf_to_powerpoint_is_unsupported() {
        let err = pdf_to_powerpoint(&create_test_pdf(1, "P")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported format: PDF to PowerPoint conversion is not supported"
        );
    }

    #[test]
    fn test_powerpoint_slides_in_numeric_order() {
        let slide = |text: &str| {
            format!(
                r#"<p:sld xmlns:p="p" xmlns:a="a"><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sld>"#,
                text
            )
        };
        let (s1, s2, s10) = (slide("One"), slide("Two"), slide("Ten"));
        let pptx = zip_of(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
            ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
        ]);

        let output = powerpoint_to_pdf(&pptx).unwrap();
        let doc = Document::load_mem(&output.artifacts[0].bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert_eq!(page_strings(&doc, 1), vec!["Slide 1".to_string(), "One".to_string()]);
        assert_eq!(page_strings(&doc, 3), vec!["Slide 3".to_string(), "Ten".to_string()]);
    }
}
