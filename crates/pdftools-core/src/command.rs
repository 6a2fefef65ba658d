//! Operation catalog, typed parameters and results
//!
//! Every tool is addressed by a fixed kebab-case name. Parameters arrive as an
//! untyped JSON bag and are parsed into a [`PdfCommand`] before anything runs,
//! so a misused tool is rejected without touching its inputs.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::PdfToolsError;

/// Named tools exposed by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    MergePdf,
    SplitPdf,
    CompressPdf,
    RotatePdf,
    WatermarkPdf,
    OrganizePdf,
    ProtectPdf,
    UnlockPdf,
    RedactPdf,
    HtmlToPdf,
    NumberPages,
    RepairPdf,
    PdfToPdfa,
    EditPdf,
    SignPdf,
    CropPdf,
    ScanToPdf,
    OcrPdf,
    ComparePdf,
    PdfToJpg,
    JpgToPdf,
    PdfToWord,
    WordToPdf,
    PdfToExcel,
    ExcelToPdf,
    PdfToPowerpoint,
    PowerpointToPdf,
}

/// Tool grouping used by the operation catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    #[serde(rename = "Organize PDF")]
    Organize,
    #[serde(rename = "Optimize PDF")]
    Optimize,
    #[serde(rename = "Convert PDF")]
    Convert,
    #[serde(rename = "Edit PDF")]
    Edit,
    #[serde(rename = "PDF Security")]
    Security,
    #[serde(rename = "Advanced")]
    Advanced,
}

/// How many input files an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
    /// Zero or one file; zero only when content is supplied inline
    OptionalOne,
}

impl Operation {
    pub const ALL: [Operation; 27] = [
        Operation::MergePdf,
        Operation::SplitPdf,
        Operation::CompressPdf,
        Operation::RotatePdf,
        Operation::WatermarkPdf,
        Operation::OrganizePdf,
        Operation::ProtectPdf,
        Operation::UnlockPdf,
        Operation::RedactPdf,
        Operation::HtmlToPdf,
        Operation::NumberPages,
        Operation::RepairPdf,
        Operation::PdfToPdfa,
        Operation::EditPdf,
        Operation::SignPdf,
        Operation::CropPdf,
        Operation::ScanToPdf,
        Operation::OcrPdf,
        Operation::ComparePdf,
        Operation::PdfToJpg,
        Operation::JpgToPdf,
        Operation::PdfToWord,
        Operation::WordToPdf,
        Operation::PdfToExcel,
        Operation::ExcelToPdf,
        Operation::PdfToPowerpoint,
        Operation::PowerpointToPdf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::MergePdf => "merge-pdf",
            Operation::SplitPdf => "split-pdf",
            Operation::CompressPdf => "compress-pdf",
            Operation::RotatePdf => "rotate-pdf",
            Operation::WatermarkPdf => "watermark-pdf",
            Operation::OrganizePdf => "organize-pdf",
            Operation::ProtectPdf => "protect-pdf",
            Operation::UnlockPdf => "unlock-pdf",
            Operation::RedactPdf => "redact-pdf",
            Operation::HtmlToPdf => "html-to-pdf",
            Operation::NumberPages => "number-pages",
            Operation::RepairPdf => "repair-pdf",
            Operation::PdfToPdfa => "pdf-to-pdfa",
            Operation::EditPdf => "edit-pdf",
            Operation::SignPdf => "sign-pdf",
            Operation::CropPdf => "crop-pdf",
            Operation::ScanToPdf => "scan-to-pdf",
            Operation::OcrPdf => "ocr-pdf",
            Operation::ComparePdf => "compare-pdf",
            Operation::PdfToJpg => "pdf-to-jpg",
            Operation::JpgToPdf => "jpg-to-pdf",
            Operation::PdfToWord => "pdf-to-word",
            Operation::WordToPdf => "word-to-pdf",
            Operation::PdfToExcel => "pdf-to-excel",
            Operation::ExcelToPdf => "excel-to-pdf",
            Operation::PdfToPowerpoint => "pdf-to-powerpoint",
            Operation::PowerpointToPdf => "powerpoint-to-pdf",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Operation::MergePdf => "Merge PDF",
            Operation::SplitPdf => "Split PDF",
            Operation::CompressPdf => "Compress PDF",
            Operation::RotatePdf => "Rotate PDF",
            Operation::WatermarkPdf => "Watermark",
            Operation::OrganizePdf => "Organize PDF",
            Operation::ProtectPdf => "Protect PDF",
            Operation::UnlockPdf => "Unlock PDF",
            Operation::RedactPdf => "Redact PDF",
            Operation::HtmlToPdf => "HTML to PDF",
            Operation::NumberPages => "Number Pages",
            Operation::RepairPdf => "Repair PDF",
            Operation::PdfToPdfa => "PDF to PDF/A",
            Operation::EditPdf => "Edit PDF",
            Operation::SignPdf => "Sign PDF",
            Operation::CropPdf => "Crop PDF",
            Operation::ScanToPdf => "Scan to PDF",
            Operation::OcrPdf => "OCR PDF",
            Operation::ComparePdf => "Compare PDF",
            Operation::PdfToJpg => "PDF to JPG",
            Operation::JpgToPdf => "JPG to PDF",
            Operation::PdfToWord => "PDF to Word",
            Operation::WordToPdf => "Word to PDF",
            Operation::PdfToExcel => "PDF to Excel",
            Operation::ExcelToPdf => "Excel to PDF",
            Operation::PdfToPowerpoint => "PDF to PowerPoint",
            Operation::PowerpointToPdf => "PowerPoint to PDF",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Operation::MergePdf
            | Operation::SplitPdf
            | Operation::OrganizePdf
            | Operation::RotatePdf => Category::Organize,
            Operation::CompressPdf | Operation::RepairPdf => Category::Optimize,
            Operation::EditPdf
            | Operation::SignPdf
            | Operation::WatermarkPdf
            | Operation::NumberPages
            | Operation::CropPdf => Category::Edit,
            Operation::ProtectPdf | Operation::UnlockPdf | Operation::RedactPdf => {
                Category::Security
            }
            Operation::ScanToPdf | Operation::OcrPdf | Operation::ComparePdf => Category::Advanced,
            _ => Category::Convert,
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Operation::MergePdf | Operation::JpgToPdf | Operation::ScanToPdf => Arity::AtLeast(1),
            Operation::ComparePdf => Arity::Exactly(2),
            Operation::HtmlToPdf => Arity::OptionalOne,
            _ => Arity::Exactly(1),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = PdfToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| PdfToolsError::UnknownOperation(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SplitParams {
    /// Optional groups such as "1-3, 5"; each comma-separated group becomes one file
    pub ranges: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RotateParams {
    pub degrees: i64,
    /// 1-indexed pages to rotate; all pages when absent
    pub pages: Option<Vec<u32>>,
}

impl Default for RotateParams {
    fn default() -> Self {
        Self {
            degrees: 90,
            pages: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    #[default]
    Center,
    Diagonal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatermarkParams {
    pub text: String,
    pub opacity: f32,
    pub font_size: f32,
    pub position: WatermarkPosition,
}

impl Default for WatermarkParams {
    fn default() -> Self {
        Self {
            text: "WATERMARK".into(),
            opacity: 0.3,
            font_size: 50.0,
            position: WatermarkPosition::Center,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganizeParams {
    /// New order as 1-indexed page numbers; empty reverses the document
    pub page_order: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordParams {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactArea {
    pub page: i64,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedactParams {
    pub areas: Option<Vec<RedactArea>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HtmlParams {
    pub html_content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumberPosition {
    #[default]
    BottomCenter,
    BottomLeft,
    BottomRight,
    TopCenter,
    TopLeft,
    TopRight,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NumberPagesParams {
    pub position: NumberPosition,
    /// Label template; `{n}` and `{total}` are substituted
    pub format: String,
    pub font_size: f32,
    pub start_page: i64,
}

impl Default for NumberPagesParams {
    fn default() -> Self {
        Self {
            position: NumberPosition::BottomCenter,
            format: "Page {n} of {total}".into(),
            font_size: 12.0,
            start_page: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    pub content: String,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_text_size")]
    pub size: f32,
    pub color: Option<String>,
    pub font_family: Option<String>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

fn default_text_size() -> f32 {
    12.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Circle,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeItem {
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: Option<String>,
    #[serde(default)]
    pub filled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditParams {
    pub text: Vec<TextItem>,
    pub shapes: Vec<ShapeItem>,
    pub page: i64,
}

impl Default for EditParams {
    fn default() -> Self {
        Self {
            text: Vec::new(),
            shapes: Vec::new(),
            page: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignParams {
    pub signature_text: String,
    /// Baseline of the signature text; defaults to the lower right of the page
    pub position: Option<Point>,
    pub page: i64,
}

impl Default for SignParams {
    fn default() -> Self {
        Self {
            signature_text: "Digitally Signed".into(),
            position: None,
            page: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CropParams {
    /// Offsets and size in points relative to the lower-left corner of the page.
    /// Missing values default to a 10% margin on every side.
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub pages: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrParams {
    pub language: String,
}

impl Default for OcrParams {
    fn default() -> Self {
        Self {
            language: "eng".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JpgParams {
    pub quality: u8,
}

impl Default for JpgParams {
    fn default() -> Self {
        Self { quality: 85 }
    }
}

/// A fully parsed request for one tool
#[derive(Debug, Clone)]
pub enum PdfCommand {
    Merge,
    Split(SplitParams),
    Compress,
    Rotate(RotateParams),
    Watermark(WatermarkParams),
    Organize(OrganizeParams),
    Protect(PasswordParams),
    Unlock(PasswordParams),
    Redact(RedactParams),
    HtmlToPdf(HtmlParams),
    NumberPages(NumberPagesParams),
    Repair,
    ToPdfa,
    Edit(EditParams),
    Sign(SignParams),
    Crop(CropParams),
    ScanToPdf,
    Ocr(OcrParams),
    Compare,
    PdfToJpg(JpgParams),
    JpgToPdf,
    PdfToWord,
    WordToPdf,
    PdfToExcel,
    ExcelToPdf,
    PdfToPowerpoint,
    PowerpointToPdf,
}

fn params<T: DeserializeOwned + Default>(
    op: Operation,
    raw: &serde_json::Value,
) -> Result<T, PdfToolsError> {
    if raw.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(raw.clone()).map_err(|e| {
        PdfToolsError::usage(format!("Invalid parameters for {}: {}", op.as_str(), e))
    })
}

impl PdfCommand {
    /// Parse and validate the parameter bag for `op`.
    pub fn parse(op: Operation, raw: &serde_json::Value) -> Result<Self, PdfToolsError> {
        let command = match op {
            Operation::MergePdf => PdfCommand::Merge,
            Operation::SplitPdf => PdfCommand::Split(params(op, raw)?),
            Operation::CompressPdf => PdfCommand::Compress,
            Operation::RotatePdf => PdfCommand::Rotate(params(op, raw)?),
            Operation::WatermarkPdf => PdfCommand::Watermark(params(op, raw)?),
            Operation::OrganizePdf => PdfCommand::Organize(params(op, raw)?),
            Operation::ProtectPdf => PdfCommand::Protect(params(op, raw)?),
            Operation::UnlockPdf => PdfCommand::Unlock(params(op, raw)?),
            Operation::RedactPdf => PdfCommand::Redact(params(op, raw)?),
            Operation::HtmlToPdf => PdfCommand::HtmlToPdf(params(op, raw)?),
            Operation::NumberPages => PdfCommand::NumberPages(params(op, raw)?),
            Operation::RepairPdf => PdfCommand::Repair,
            Operation::PdfToPdfa => PdfCommand::ToPdfa,
            Operation::EditPdf => PdfCommand::Edit(params(op, raw)?),
            Operation::SignPdf => PdfCommand::Sign(params(op, raw)?),
            Operation::CropPdf => PdfCommand::Crop(params(op, raw)?),
            Operation::ScanToPdf => PdfCommand::ScanToPdf,
            Operation::OcrPdf => PdfCommand::Ocr(params(op, raw)?),
            Operation::ComparePdf => PdfCommand::Compare,
            Operation::PdfToJpg => PdfCommand::PdfToJpg(params(op, raw)?),
            Operation::JpgToPdf => PdfCommand::JpgToPdf,
            Operation::PdfToWord => PdfCommand::PdfToWord,
            Operation::WordToPdf => PdfCommand::WordToPdf,
            Operation::PdfToExcel => PdfCommand::PdfToExcel,
            Operation::ExcelToPdf => PdfCommand::ExcelToPdf,
            Operation::PdfToPowerpoint => PdfCommand::PdfToPowerpoint,
            Operation::PowerpointToPdf => PdfCommand::PowerpointToPdf,
        };
        command.validate()?;
        Ok(command)
    }

    pub fn operation(&self) -> Operation {
        match self {
            PdfCommand::Merge => Operation::MergePdf,
            PdfCommand::Split(_) => Operation::SplitPdf,
            PdfCommand::Compress => Operation::CompressPdf,
            PdfCommand::Rotate(_) => Operation::RotatePdf,
            PdfCommand::Watermark(_) => Operation::WatermarkPdf,
            PdfCommand::Organize(_) => Operation::OrganizePdf,
            PdfCommand::Protect(_) => Operation::ProtectPdf,
            PdfCommand::Unlock(_) => Operation::UnlockPdf,
            PdfCommand::Redact(_) => Operation::RedactPdf,
            PdfCommand::HtmlToPdf(_) => Operation::HtmlToPdf,
            PdfCommand::NumberPages(_) => Operation::NumberPages,
            PdfCommand::Repair => Operation::RepairPdf,
            PdfCommand::ToPdfa => Operation::PdfToPdfa,
            PdfCommand::Edit(_) => Operation::EditPdf,
            PdfCommand::Sign(_) => Operation::SignPdf,
            PdfCommand::Crop(_) => Operation::CropPdf,
            PdfCommand::ScanToPdf => Operation::ScanToPdf,
            PdfCommand::Ocr(_) => Operation::OcrPdf,
            PdfCommand::Compare => Operation::ComparePdf,
            PdfCommand::PdfToJpg(_) => Operation::PdfToJpg,
            PdfCommand::JpgToPdf => Operation::JpgToPdf,
            PdfCommand::PdfToWord => Operation::PdfToWord,
            PdfCommand::WordToPdf => Operation::WordToPdf,
            PdfCommand::PdfToExcel => Operation::PdfToExcel,
            PdfCommand::ExcelToPdf => Operation::ExcelToPdf,
            PdfCommand::PdfToPowerpoint => Operation::PdfToPowerpoint,
            PdfCommand::PowerpointToPdf => Operation::PowerpointToPdf,
        }
    }

    /// Semantic checks that do not need the input documents.
    fn validate(&self) -> Result<(), PdfToolsError> {
        match self {
            PdfCommand::Protect(p) => {
                let password = p.password.as_deref().unwrap_or_default();
                if password.is_empty() {
                    return Err(PdfToolsError::usage(
                        "Password is required to protect a PDF",
                    ));
                }
                if password.chars().count() < 4 {
                    return Err(PdfToolsError::usage(
                        "Password must be at least 4 characters long",
                    ));
                }
            }
            PdfCommand::Unlock(p) => {
                if p.password.as_deref().unwrap_or_default().is_empty() {
                    return Err(PdfToolsError::usage("Password is required to unlock a PDF"));
                }
            }
            PdfCommand::Redact(p) => {
                let areas = p.areas.as_deref().unwrap_or_default();
                if areas.is_empty() {
                    return Err(PdfToolsError::usage(
                        "Redaction areas must be specified with page, x, y, width, and height",
                    ));
                }
                for area in areas {
                    if area.page < 1 {
                        return Err(PdfToolsError::usage(format!(
                            "Redaction page must be a positive integer, got {}",
                            area.page
                        )));
                    }
                    let finite = [area.x, area.y, area.width, area.height]
                        .iter()
                        .all(|v| v.is_finite());
                    if !finite || area.width <= 0.0 || area.height <= 0.0 {
                        return Err(PdfToolsError::usage(format!(
                            "Redaction area on page {} must have a positive width and height",
                            area.page
                        )));
                    }
                }
            }
            PdfCommand::Rotate(p) => {
                if p.degrees % 90 != 0 {
                    return Err(PdfToolsError::usage(format!(
                        "Rotation must be a multiple of 90 degrees, got {}",
                        p.degrees
                    )));
                }
                check_page_list(p.pages.as_deref())?;
            }
            PdfCommand::Watermark(p) => {
                if p.text.trim().is_empty() {
                    return Err(PdfToolsError::usage("Watermark text must not be empty"));
                }
                if !(0.0..=1.0).contains(&p.opacity) {
                    return Err(PdfToolsError::usage(
                        "Watermark opacity must be between 0 and 1",
                    ));
                }
                check_font_size(p.font_size)?;
            }
            PdfCommand::NumberPages(p) => {
                check_font_size(p.font_size)?;
                if p.start_page < 1 {
                    return Err(PdfToolsError::usage("startPage must be at least 1"));
                }
            }
            PdfCommand::Edit(p) => {
                if p.text.is_empty() && p.shapes.is_empty() {
                    return Err(PdfToolsError::usage(
                        "Edit requires at least one text item or shape",
                    ));
                }
                if p.page < 1 {
                    return Err(PdfToolsError::usage("Page must be a positive integer"));
                }
                for item in &p.text {
                    check_font_size(item.size)?;
                }
                for shape in &p.shapes {
                    if shape.width <= 0.0 || shape.height <= 0.0 {
                        return Err(PdfToolsError::usage(
                            "Shapes must have a positive width and height",
                        ));
                    }
                }
            }
            PdfCommand::Sign(p) => {
                if p.signature_text.trim().is_empty() {
                    return Err(PdfToolsError::usage("Signature text must not be empty"));
                }
                if p.page < 1 {
                    return Err(PdfToolsError::usage("Page must be a positive integer"));
                }
            }
            PdfCommand::Crop(p) => {
                let negative = [p.x, p.y].iter().flatten().any(|v| *v < 0.0);
                let empty = [p.width, p.height].iter().flatten().any(|v| *v <= 0.0);
                if negative || empty {
                    return Err(PdfToolsError::usage(
                        "Crop offsets must be non-negative and the crop size positive",
                    ));
                }
                check_page_list(p.pages.as_deref())?;
            }
            PdfCommand::PdfToJpg(p) => {
                if !(1..=100).contains(&p.quality) {
                    return Err(PdfToolsError::usage("JPEG quality must be between 1 and 100"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Check the number of input files against the operation's arity.
    pub fn validate_inputs(&self, count: usize) -> Result<(), PdfToolsError> {
        let op = self.operation();
        match op.arity() {
            Arity::Exactly(n) if count != n => Err(PdfToolsError::usage(format!(
                "{} operation requires exactly {} input file{}",
                op.title(),
                number_word(n),
                if n == 1 { "" } else { "s" }
            ))),
            Arity::AtLeast(n) if count < n => Err(PdfToolsError::usage(format!(
                "{} operation requires at least {} input file{}",
                op.title(),
                number_word(n),
                if n == 1 { "" } else { "s" }
            ))),
            Arity::OptionalOne => {
                let inline = matches!(
                    self,
                    PdfCommand::HtmlToPdf(HtmlParams { html_content: Some(html) })
                        if !html.trim().is_empty()
                );
                if count > 1 || (count == 0 && !inline) {
                    Err(PdfToolsError::usage(format!(
                        "{} operation requires exactly one input file or inline htmlContent",
                        op.title()
                    )))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

fn number_word(n: usize) -> String {
    match n {
        1 => "one".into(),
        2 => "two".into(),
        other => other.to_string(),
    }
}

fn check_font_size(size: f32) -> Result<(), PdfToolsError> {
    if size.is_finite() && size > 0.0 && size <= 500.0 {
        Ok(())
    } else {
        Err(PdfToolsError::usage(format!(
            "Font size must be between 0 and 500, got {}",
            size
        )))
    }
}

fn check_page_list(pages: Option<&[u32]>) -> Result<(), PdfToolsError> {
    if pages.is_some_and(|p| p.contains(&0)) {
        return Err(PdfToolsError::usage("Page numbers must be >= 1"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inputs and results
// ---------------------------------------------------------------------------

/// One input file handed to a routine
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InputDocument {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, "application/pdf", bytes)
    }
}

/// One produced file, not yet stored anywhere
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Name prefix such as `merged` or `page-3`
    pub tag: String,
    pub extension: &'static str,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(
        tag: impl Into<String>,
        extension: &'static str,
        mime_type: &'static str,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            tag: tag.into(),
            extension,
            mime_type,
            bytes,
        }
    }

    pub fn pdf(tag: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(tag, "pdf", "application/pdf", bytes)
    }
}

/// Outcome of a routine: produced files plus disclosed limitations
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub artifacts: Vec<Artifact>,
    /// Known limitations of the result, reported alongside success
    pub notices: Vec<String>,
}

impl ProcessOutput {
    pub fn single(artifact: Artifact) -> Self {
        Self {
            artifacts: vec![artifact],
            notices: Vec::new(),
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notices.push(notice.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_operation_round_trips_through_its_name() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
            let via_serde: Operation =
                serde_json::from_value(json!(op.as_str())).unwrap();
            assert_eq!(via_serde, op);
        }
    }

    #[test]
    fn test_unknown_name_is_a_routing_error() {
        let err = "not-a-real-tool".parse::<Operation>().unwrap_err();
        assert!(matches!(err, PdfToolsError::UnknownOperation(_)));
        assert_eq!(err.to_string(), "Unsupported operation: not-a-real-tool");
    }

    #[test]
    fn test_protect_requires_password() {
        let err = PdfCommand::parse(Operation::ProtectPdf, &json!({})).unwrap_err();
        assert!(matches!(err, PdfToolsError::InvalidParameters(_)));
        assert!(err.to_string().contains("Password is required"));

        let err =
            PdfCommand::parse(Operation::ProtectPdf, &json!({"password": "abc"})).unwrap_err();
        assert!(err.to_string().contains("at least 4 characters"));

        assert!(PdfCommand::parse(Operation::ProtectPdf, &json!({"password": "abcd"})).is_ok());
    }

    #[test]
    fn test_unlock_requires_password() {
        let err = PdfCommand::parse(Operation::UnlockPdf, &json!({"password": ""})).unwrap_err();
        assert!(err.to_string().contains("Password is required"));
    }

    #[test]
    fn test_redact_requires_areas() {
        let err = PdfCommand::parse(Operation::RedactPdf, &json!({"areas": []})).unwrap_err();
        assert!(err.to_string().contains("Redaction areas must be specified"));

        let err = PdfCommand::parse(
            Operation::RedactPdf,
            &json!({"areas": [{"page": 0, "x": 1, "y": 1, "width": 5, "height": 5}]}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("positive integer"));

        let err = PdfCommand::parse(
            Operation::RedactPdf,
            &json!({"areas": [{"page": 1, "x": 1, "y": 1}]}),
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("Invalid parameters for redact-pdf"));
    }

    #[test]
    fn test_rotation_must_be_right_angle() {
        assert!(PdfCommand::parse(Operation::RotatePdf, &json!({"degrees": 45})).is_err());
        assert!(PdfCommand::parse(Operation::RotatePdf, &json!({"degrees": -90})).is_ok());
        assert!(PdfCommand::parse(Operation::RotatePdf, &serde_json::Value::Null).is_ok());
    }

    #[test]
    fn test_watermark_defaults() {
        let cmd = PdfCommand::parse(Operation::WatermarkPdf, &json!({})).unwrap();
        let PdfCommand::Watermark(p) = cmd else {
            panic!("expected watermark command");
        };
        assert_eq!(p.text, "WATERMARK");
        assert_eq!(p.opacity, 0.3);
        assert_eq!(p.font_size, 50.0);
        assert_eq!(p.position, WatermarkPosition::Center);
    }

    #[test]
    fn test_unknown_enum_value_is_usage_error() {
        let err =
            PdfCommand::parse(Operation::NumberPages, &json!({"position": "middle"})).unwrap_err();
        assert!(matches!(err, PdfToolsError::InvalidParameters(_)));
    }

    #[test]
    fn test_compare_requires_exactly_two_inputs() {
        let cmd = PdfCommand::parse(Operation::ComparePdf, &json!({})).unwrap();
        for count in [0, 1, 3] {
            let err = cmd.validate_inputs(count).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Compare PDF operation requires exactly two input files"
            );
        }
        assert!(cmd.validate_inputs(2).is_ok());
    }

    #[test]
    fn test_merge_accepts_one_or_more() {
        let cmd = PdfCommand::parse(Operation::MergePdf, &json!(null)).unwrap();
        assert!(cmd.validate_inputs(0).is_err());
        assert!(cmd.validate_inputs(1).is_ok());
        assert!(cmd.validate_inputs(7).is_ok());
    }

    #[test]
    fn test_html_accepts_inline_content_without_file() {
        let inline =
            PdfCommand::parse(Operation::HtmlToPdf, &json!({"htmlContent": "<p>hi</p>"}))
                .unwrap();
        assert!(inline.validate_inputs(0).is_ok());
        assert!(inline.validate_inputs(1).is_ok());
        assert!(inline.validate_inputs(2).is_err());

        let bare = PdfCommand::parse(Operation::HtmlToPdf, &json!({})).unwrap();
        assert!(bare.validate_inputs(0).is_err());
    }

    #[test]
    fn test_categories_cover_all_groups() {
        assert_eq!(Operation::MergePdf.category(), Category::Organize);
        assert_eq!(Operation::RepairPdf.category(), Category::Optimize);
        assert_eq!(Operation::WordToPdf.category(), Category::Convert);
        assert_eq!(Operation::CropPdf.category(), Category::Edit);
        assert_eq!(Operation::RedactPdf.category(), Category::Security);
        assert_eq!(Operation::ScanToPdf.category(), Category::Advanced);
    }
}
