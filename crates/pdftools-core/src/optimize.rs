//! Compress, repair and PDF/A metadata.

use chrono::Utc;
use lopdf::{Dictionary, Document, Object};
use tracing::{info, warn};

use crate::command::{Artifact, ProcessOutput};
use crate::document::{self, rect_object, LETTER, MAX_PAGE_DIMENSION};
use crate::error::PdfToolsError;
use crate::pages::rebuild_page_tree;

/// Drop unreferenced objects and Flate-compress every uncompressed stream.
pub fn compress_document(bytes: &[u8]) -> Result<ProcessOutput, PdfToolsError> {
    let mut doc = document::load(bytes)?;
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    let out = document::save(&mut doc)?;

    let ratio = out.len() as f64 / bytes.len().max(1) as f64;
    info!(
        "Compressed PDF from {} to {} bytes ({:.1}% of original)",
        bytes.len(),
        out.len(),
        ratio * 100.0
    );

    let mut output = ProcessOutput::single(Artifact::pdf("compressed", out));
    if ratio >= 1.0 {
        output.notices.push(
            "The document was already compact; the output is not smaller than the input".into(),
        );
    }
    Ok(output)
}

/// Cut leading bytes before the `%PDF` header and trailing bytes after the
/// last `%%EOF` marker.
fn trim_to_pdf_body(bytes: &[u8]) -> Option<&[u8]> {
    let start = bytes.windows(5).position(|w| w == b"%PDF-")?;
    let body = &bytes[start..];
    let end = body
        .windows(5)
        .rposition(|w| w == b"%%EOF")
        .map(|i| i + 5)
        .unwrap_or(body.len());
    Some(&body[..end])
}

/// Load leniently, rebuild a flat page tree and normalise bad page boxes.
pub fn repair_document(bytes: &[u8]) -> Result<ProcessOutput, PdfToolsError> {
    let too_damaged =
        |e: &dyn std::fmt::Display| PdfToolsError::OperationError(format!("PDF is too damaged to repair: {}", e));

    let mut notices = Vec::new();
    let mut doc = match document::load(bytes) {
        Ok(doc) => doc,
        Err(first) => {
            let trimmed = trim_to_pdf_body(bytes).ok_or_else(|| too_damaged(&first))?;
            let doc = Document::load_mem(trimmed).map_err(|e| too_damaged(&e))?;
            notices.push("Discarded bytes outside the PDF header and end-of-file marker".into());
            doc
        }
    };

    let page_refs = document::page_ids(&doc);
    if page_refs.is_empty() {
        return Err(too_damaged(&"no readable pages"));
    }
    rebuild_page_tree(&mut doc, &page_refs)?;

    for (index, &page_id) in page_refs.iter().enumerate() {
        let declared = doc
            .get_dictionary(page_id)?
            .get(b"MediaBox")
            .ok()
            .and_then(|obj| document::rect(&doc, obj));
        let valid = declared.is_some_and(|[x0, y0, x1, y1]| {
            let (w, h) = (x1 - x0, y1 - y0);
            w > 0.0 && h > 0.0 && w <= MAX_PAGE_DIMENSION && h <= MAX_PAGE_DIMENSION
        });
        if !valid {
            warn!("Page {} has an invalid MediaBox, resetting to Letter", index + 1);
            doc.get_object_mut(page_id)?
                .as_dict_mut()?
                .set("MediaBox", rect_object([0.0, 0.0, LETTER.0, LETTER.1]));
            notices.push(format!(
                "Page {} had invalid dimensions and was reset to US Letter",
                index + 1
            ));
        }
    }

    doc.prune_objects();
    doc.compress();
    let out = document::save(&mut doc)?;

    Ok(ProcessOutput {
        artifacts: vec![Artifact::pdf("repaired", out)],
        notices,
    })
}

fn pdf_date(now: chrono::DateTime<Utc>) -> Object {
    Object::string_literal(now.format("D:%Y%m%d%H%M%SZ").to_string())
}

/// Stamp PDF/A identification metadata. Conformance is not validated.
pub fn convert_to_pdfa(bytes: &[u8]) -> Result<ProcessOutput, PdfToolsError> {
    let mut doc = document::load(bytes)?;
    if doc.get_pages().is_empty() {
        return Err(PdfToolsError::OperationError("PDF has no pages".into()));
    }

    let now = pdf_date(Utc::now());
    let existing_info = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .ok();

    let mut info = existing_info
        .and_then(|id| doc.get_dictionary(id).ok().cloned())
        .unwrap_or_else(Dictionary::new);
    info.set("Title", Object::string_literal("PDF/A Document"));
    info.set("Creator", Object::string_literal("PDF Tools"));
    info.set("Producer", Object::string_literal("pdftools-core"));
    if !info.has(b"CreationDate") {
        info.set("CreationDate", now.clone());
    }
    info.set("ModDate", now);

    match existing_info {
        Some(id) => {
            doc.objects.insert(id, Object::Dictionary(info));
        }
        None => {
            let id = doc.add_object(info);
            doc.trailer.set("Info", Object::Reference(id));
        }
    }
    doc.version = "1.7".to_string();

    let out = document::save(&mut doc)?;
    Ok(ProcessOutput::single(Artifact::pdf("pdfa", out)).with_notice(
        "PDF/A identification metadata was applied, but full PDF/A conformance \
         (embedded fonts, color profiles, XMP metadata) is not validated",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::create_test_pdf;

    #[test]
    fn test_compress_produces_loadable_pdf() {
        let pdf = create_test_pdf(4, "Z");
        let output = compress_document(&pdf).unwrap();
        assert_eq!(output.artifacts.len(), 1);
        let doc = Document::load_mem(&output.artifacts[0].bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 4);
    }

    #[test]
    fn test_repair_strips_surrounding_garbage() {
        let mut damaged = b"garbage before header\n".to_vec();
        damaged.extend(create_test_pdf(2, "R"));
        damaged.extend(b"\ntrailing junk");

        let output = repair_document(&damaged).unwrap();
        let doc = Document::load_mem(&output.artifacts[0].bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_repair_gives_up_on_non_pdf() {
        let err = repair_document(b"hello world").unwrap_err();
        assert!(err.to_string().contains("PDF is too damaged to repair"));
    }

    #[test]
    fn test_trim_to_pdf_body() {
        assert_eq!(trim_to_pdf_body(b"xx%PDF-1.4 body %%EOF yy"), Some(&b"%PDF-1.4 body %%EOF"[..]));
        assert_eq!(trim_to_pdf_body(b"nothing"), None);
    }

    #[test]
    fn test_pdfa_sets_metadata_and_discloses_limits() {
        let output = convert_to_pdfa(&create_test_pdf(1, "A")).unwrap();
        assert!(output.notices[0].contains("not validated"));

        let doc = Document::load_mem(&output.artifacts[0].bytes).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_id).unwrap();
        let title = info.get(b"Title").unwrap().as_str().unwrap();
        assert_eq!(title, b"PDF/A Document");
        assert!(info.has(b"ModDate"));
    }

    #[test]
    fn test_pdfa_rejects_empty_input() {
        assert!(convert_to_pdfa(&[]).is_err());
    }
}
