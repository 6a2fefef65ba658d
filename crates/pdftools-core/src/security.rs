//! Protect, unlock and redact.
//!
//! None of these change the document's security properties. Protection and
//! unlocking hand back an unencrypted copy, and redaction only paints over
//! content. Each result carries a notice saying so.

use lopdf::Document;
use tracing::warn;

use crate::command::{Artifact, PasswordParams, ProcessOutput, RedactParams};
use crate::document::{self, Canvas};
use crate::error::PdfToolsError;

pub const PROTECT_NOTICE: &str = "Password protection was not applied: true PDF encryption is \
     not supported, so the output is an unencrypted copy of the original document";

pub const UNLOCK_NOTICE: &str = "The document was not encrypted; no password was removed and \
     the output is an unmodified copy";

pub const ENCRYPTED_ERROR: &str = "This PDF appears to be encrypted and cannot be processed. \
     Removing passwords from encrypted PDFs is not supported";

pub const REDACT_NOTICE: &str = "Redaction is visual only: opaque rectangles were drawn over \
     the selected areas, but the underlying text and images were not removed and may still \
     be extractable";

fn load_unencrypted(bytes: &[u8]) -> Result<Document, PdfToolsError> {
    match document::load(bytes) {
        Ok(doc) if document::is_encrypted(&doc) => {
            Err(PdfToolsError::OperationError(ENCRYPTED_ERROR.into()))
        }
        Ok(doc) => Ok(doc),
        Err(_) if bytes.windows(8).any(|w| w == b"/Encrypt") => {
            Err(PdfToolsError::OperationError(ENCRYPTED_ERROR.into()))
        }
        Err(e) => Err(e),
    }
}

pub fn protect_document(
    bytes: &[u8],
    _params: &PasswordParams,
) -> Result<ProcessOutput, PdfToolsError> {
    let mut doc = load_unencrypted(bytes)?;
    let out = document::save(&mut doc)?;
    warn!("Protect requested; returning an unencrypted copy");
    Ok(ProcessOutput::single(Artifact::pdf("protected", out)).with_notice(PROTECT_NOTICE))
}

pub fn unlock_document(
    bytes: &[u8],
    _params: &PasswordParams,
) -> Result<ProcessOutput, PdfToolsError> {
    let mut doc = load_unencrypted(bytes)?;
    let out = document::save(&mut doc)?;
    Ok(ProcessOutput::single(Artifact::pdf("unlocked", out)).with_notice(UNLOCK_NOTICE))
}

/// Paint opaque black rectangles over the requested areas. Coordinates are
/// PDF user space with the origin at the lower left of the page.
pub fn redact_document(
    bytes: &[u8],
    params: &RedactParams,
) -> Result<ProcessOutput, PdfToolsError> {
    let areas = params.areas.as_deref().unwrap_or_default();
    if areas.is_empty() {
        return Err(PdfToolsError::usage(
            "Redaction areas must be specified with page, x, y, width, and height",
        ));
    }

    let mut doc = load_unencrypted(bytes)?;

    // Resolve every page before drawing so a bad area leaves no partial output
    let targets = areas
        .iter()
        .map(|area| document::page_id(&doc, area.page).map(|id| (id, area)))
        .collect::<Result<Vec<_>, _>>()?;

    for (page_id, area) in targets {
        let mut canvas = Canvas::new();
        canvas
            .save()
            .fill_color((1.0, 1.0, 1.0))
            .rect(area.x, area.y, area.width, area.height)
            .fill()
            .fill_color((0.0, 0.0, 0.0))
            .rect(area.x, area.y, area.width, area.height)
            .fill()
            .restore();
        document::append_content(&mut doc, page_id, canvas.into_operations())?;
    }

    let out = document::save(&mut doc)?;
    Ok(ProcessOutput::single(Artifact::pdf("redacted", out)).with_notice(REDACT_NOTICE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RedactArea;
    use crate::document::test_support::{create_test_pdf, page_operations};
    use lopdf::Object;

    fn area(page: i64) -> RedactArea {
        RedactArea {
            page,
            x: 100.0,
            y: 700.0,
            width: 200.0,
            height: 20.0,
        }
    }

    #[test]
    fn test_redact_draws_opaque_rectangle_and_discloses() {
        let pdf = create_test_pdf(1, "Secret");
        let output = redact_document(
            &pdf,
            &RedactParams {
                areas: Some(vec![area(1)]),
            },
        )
        .unwrap();

        assert_eq!(output.notices, vec![REDACT_NOTICE.to_string()]);
        assert!(output.notices[0].contains("visual only"));
        assert!(!output.notices[0].contains("removed from the document"));

        let doc = Document::load_mem(&output.artifacts[0].bytes).unwrap();
        let ops = page_operations(&doc, 1);
        let black_fill = ops.windows(3).any(|w| {
            w[0].operator == "rg"
                && w[0].operands.iter().all(|o| document::number(o) == Some(0.0))
                && w[1].operator == "re"
                && w[1]
                    .operands
                    .iter()
                    .map(|o| document::number(o).unwrap())
                    .eq([100.0, 700.0, 200.0, 20.0])
                && w[2].operator == "f"
        });
        assert!(black_fill, "expected a filled black rectangle at the area");
    }

    #[test]
    fn test_redact_rejects_missing_page() {
        let pdf = create_test_pdf(1, "Secret");
        let err = redact_document(
            &pdf,
            &RedactParams {
                areas: Some(vec![area(1), area(3)]),
            },
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid page range: Page 3 does not exist in the PDF (total pages: 1)"
        );
    }

    #[test]
    fn test_protect_returns_copy_with_warning() {
        let pdf = create_test_pdf(2, "P");
        let params = PasswordParams {
            password: Some("hunter2".into()),
        };
        let output = protect_document(&pdf, &params).unwrap();
        assert_eq!(output.notices, vec![PROTECT_NOTICE.to_string()]);
        let doc = Document::load_mem(&output.artifacts[0].bytes).unwrap();
        assert!(!document::is_encrypted(&doc));
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_unlock_refuses_encrypted_documents() {
        let pdf = create_test_pdf(1, "U");
        let mut doc = Document::load_mem(&pdf).unwrap();
        let fake_encrypt = doc.add_object(lopdf::dictionary! { "Filter" => "Standard" });
        doc.trailer.set("Encrypt", Object::Reference(fake_encrypt));
        let mut encrypted = Vec::new();
        doc.save_to(&mut encrypted).unwrap();

        let params = PasswordParams {
            password: Some("pw".into()),
        };
        let err = unlock_document(&encrypted, &params).unwrap_err();
        assert!(err.to_string().contains("appears to be encrypted"));
    }
}
