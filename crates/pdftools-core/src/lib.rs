//! PDF tool routines
//!
//! Every tool takes its input files as bytes and returns new files as
//! [`Artifact`]s, together with notices describing known limitations of the
//! result. Nothing here touches the filesystem; storage and job tracking
//! belong to the server.
//!
//! The usual entry point is [`process`], which resolves an operation name,
//! parses its parameters, checks the input count and then runs the tool.

pub mod command;
pub mod compare;
pub mod document;
pub mod error;
pub mod html;
pub mod images;
pub mod layout;
pub mod merge;
pub mod office;
pub mod optimize;
pub mod overlay;
pub mod pages;
pub mod security;
pub mod split;

pub use command::{
    Arity, Artifact, Category, InputDocument, Operation, PdfCommand, ProcessOutput,
};
pub use error::{ErrorKind, PdfToolsError};
pub use merge::merge_documents;
pub use split::split_document;

use tracing::debug;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfToolsError> {
    let doc = document::load(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

fn first(inputs: &[InputDocument]) -> Result<&InputDocument, PdfToolsError> {
    inputs
        .first()
        .ok_or_else(|| PdfToolsError::usage("No input file provided"))
}

fn pdf(tag: &str, bytes: Vec<u8>) -> ProcessOutput {
    ProcessOutput::single(Artifact::pdf(tag, bytes))
}

/// Run an already parsed command. The input count is checked again here so
/// a caller that skipped [`PdfCommand::validate_inputs`] still gets an error
/// rather than a panic.
pub fn execute(
    command: &PdfCommand,
    inputs: &[InputDocument],
) -> Result<ProcessOutput, PdfToolsError> {
    command.validate_inputs(inputs.len())?;
    debug!(
        "Running {} on {} input(s)",
        command.operation(),
        inputs.len()
    );

    let output = match command {
        PdfCommand::Merge => {
            let docs: Vec<Vec<u8>> = inputs.iter().map(|i| i.bytes.clone()).collect();
            pdf("merged", merge::merge_documents(&docs)?)
        }
        PdfCommand::Split(p) => {
            let parts = split::split_pages(&first(inputs)?.bytes, p.ranges.as_deref())?;
            ProcessOutput {
                artifacts: parts
                    .into_iter()
                    .map(|(tag, bytes)| Artifact::pdf(tag, bytes))
                    .collect(),
                notices: Vec::new(),
            }
        }
        PdfCommand::Compress => optimize::compress_document(&first(inputs)?.bytes)?,
        PdfCommand::Rotate(p) => pdf("rotated", pages::rotate_pages(&first(inputs)?.bytes, p)?),
        PdfCommand::Watermark(p) => pdf(
            "watermarked",
            overlay::watermark_document(&first(inputs)?.bytes, p)?,
        ),
        PdfCommand::Organize(p) => {
            pdf("organized", pages::organize_pages(&first(inputs)?.bytes, p)?)
        }
        PdfCommand::Protect(p) => security::protect_document(&first(inputs)?.bytes, p)?,
        PdfCommand::Unlock(p) => security::unlock_document(&first(inputs)?.bytes, p)?,
        PdfCommand::Redact(p) => security::redact_document(&first(inputs)?.bytes, p)?,
        PdfCommand::HtmlToPdf(p) => {
            let html = match p.html_content.as_deref().filter(|h| !h.trim().is_empty()) {
                Some(inline) => inline.to_string(),
                None => String::from_utf8_lossy(&first(inputs)?.bytes).into_owned(),
            };
            html::html_to_pdf(&html)?
        }
        PdfCommand::NumberPages(p) => {
            pdf("numbered", overlay::number_pages(&first(inputs)?.bytes, p)?)
        }
        PdfCommand::Repair => optimize::repair_document(&first(inputs)?.bytes)?,
        PdfCommand::ToPdfa => optimize::convert_to_pdfa(&first(inputs)?.bytes)?,
        PdfCommand::Edit(p) => pdf("edited", overlay::edit_document(&first(inputs)?.bytes, p)?),
        PdfCommand::Sign(p) => pdf("signed", overlay::sign_document(&first(inputs)?.bytes, p)?)
            .with_notice(overlay::SIGN_NOTICE),
        PdfCommand::Crop(p) => pdf("cropped", pages::crop_pages(&first(inputs)?.bytes, p)?),
        PdfCommand::ScanToPdf => images::scan_to_pdf(inputs)?,
        PdfCommand::Ocr(p) => pdf("ocr", overlay::ocr_document(&first(inputs)?.bytes, p)?)
            .with_notice(overlay::OCR_NOTICE),
        PdfCommand::Compare => compare::compare_documents(&inputs[0], &inputs[1])?,
        PdfCommand::PdfToJpg(p) => images::pdf_to_jpg(&first(inputs)?.bytes, p)?,
        PdfCommand::JpgToPdf => images::images_to_pdf(inputs)?,
        PdfCommand::PdfToWord => office::pdf_to_word(&first(inputs)?.bytes)?,
        PdfCommand::WordToPdf => office::word_to_pdf(&first(inputs)?.bytes)?,
        PdfCommand::PdfToExcel => office::pdf_to_excel(&first(inputs)?.bytes)?,
        PdfCommand::ExcelToPdf => office::excel_to_pdf(&first(inputs)?.bytes)?,
        PdfCommand::PdfToPowerpoint => office::pdf_to_powerpoint(&first(inputs)?.bytes)?,
        PdfCommand::PowerpointToPdf => office::powerpoint_to_pdf(&first(inputs)?.bytes)?,
    };
    Ok(output)
}

/// Resolve `operation`, parse `params` and run the tool on `inputs`.
pub fn process(
    operation: &str,
    params: &serde_json::Value,
    inputs: &[InputDocument],
) -> Result<ProcessOutput, PdfToolsError> {
    let op: Operation = operation.parse()?;
    let command = PdfCommand::parse(op, params)?;
    execute(&command, inputs)
}
