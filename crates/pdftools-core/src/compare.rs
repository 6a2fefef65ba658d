//! Side-by-side text comparison of two PDFs, rendered as a PDF report.

use std::collections::HashSet;
use std::panic;

use tracing::warn;

use crate::command::{Artifact, InputDocument, ProcessOutput};
use crate::document;
use crate::error::PdfToolsError;
use crate::layout::{TextDocument, LETTER};

const MAX_LISTED: usize = 20;

/// Extract text, treating extractor panics on exotic fonts as "no text".
pub fn extract_text(bytes: &[u8]) -> String {
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("Text extraction failed: {}", e);
            String::new()
        }
        Err(_) => {
            warn!("Text extraction panicked");
            String::new()
        }
    }
}

fn normalized_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect()
}

/// Lines only in `a` and lines only in `b`, each in document order.
pub fn line_differences(a: &str, b: &str) -> (Vec<String>, Vec<String>) {
    let lines_a = normalized_lines(a);
    let lines_b = normalized_lines(b);
    let set_a: HashSet<&String> = lines_a.iter().collect();
    let set_b: HashSet<&String> = lines_b.iter().collect();

    let removed = lines_a.iter().filter(|l| !set_b.contains(l)).cloned().collect();
    let added = lines_b.iter().filter(|l| !set_a.contains(l)).cloned().collect();
    (removed, added)
}

pub fn compare_documents(
    first: &InputDocument,
    second: &InputDocument,
) -> Result<ProcessOutput, PdfToolsError> {
    let doc_a = document::load(&first.bytes)?;
    let doc_b = document::load(&second.bytes)?;
    let pages_a = doc_a.get_pages().len();
    let pages_b = doc_b.get_pages().len();

    let (removed, added) = line_differences(&extract_text(&first.bytes), &extract_text(&second.bytes));

    let mut report = TextDocument::new(LETTER, 50.0);
    report.text("PDF Comparison Report", 18.0, true);
    report.skip(8.0);
    report.text(&format!("Document A: {} ({} pages)", first.name, pages_a), 11.0, false);
    report.text(&format!("Document B: {} ({} pages)", second.name, pages_b), 11.0, false);
    report.skip(6.0);

    let page_summary = if pages_a == pages_b {
        "Both documents have the same number of pages".to_string()
    } else {
        format!("Page count differs by {}", pages_a.abs_diff(pages_b))
    };
    report.text(&page_summary, 11.0, false);
    report.text(
        &format!(
            "{} line(s) only in Document A, {} line(s) only in Document B",
            removed.len(),
            added.len()
        ),
        11.0,
        false,
    );

    for (heading, lines, marker) in [
        ("Only in Document A", &removed, "-"),
        ("Only in Document B", &added, "+"),
    ] {
        if lines.is_empty() {
            continue;
        }
        report.skip(8.0);
        report.text(heading, 13.0, true);
        for line in lines.iter().take(MAX_LISTED) {
            report.text(&format!("{} {}", marker, line), 10.0, false);
        }
        if lines.len() > MAX_LISTED {
            report.text(&format!("... and {} more", lines.len() - MAX_LISTED), 10.0, false);
        }
    }

    report.skip(12.0);
    report.text(
        "Note: this report compares extracted text line by line. Layout, images and \
         formatting are not compared.",
        9.0,
        false,
    );

    let bytes = report.finish()?;
    Ok(ProcessOutput::single(Artifact::pdf("comparison-report", bytes))
        .with_notice("This is a basic text comparison; visual differences are not detected"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::{create_test_pdf, page_strings};
    use lopdf::Document;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_differences() {
        let (removed, added) = line_differences("same\nold line\n", "same\n  new   line\n");
        assert_eq!(removed, vec!["old line".to_string()]);
        assert_eq!(added, vec!["new line".to_string()]);
    }

    #[test]
    fn test_identical_text_has_no_differences() {
        let (removed, added) = line_differences("a\nb", "a\nb\n\n");
        assert!(removed.is_empty());
        assert!(added.is_empty());
    }

    #[test]
    fn test_extract_text_of_garbage_is_empty() {
        assert_eq!(extract_text(b"not a pdf"), "");
    }

    #[test]
    fn test_compare_report_lists_page_counts() {
        let a = InputDocument::pdf("a.pdf", create_test_pdf(2, "A"));
        let b = InputDocument::pdf("b.pdf", create_test_pdf(3, "B"));
        let output = compare_documents(&a, &b).unwrap();

        assert_eq!(output.artifacts[0].tag, "comparison-report");
        assert!(output.notices[0].contains("basic text comparison"));

        let doc = Document::load_mem(&output.artifacts[0].bytes).unwrap();
        let strings = page_strings(&doc, 1);
        assert_eq!(strings[0], "PDF Comparison Report");
        assert!(strings.contains(&"Document A: a.pdf (2 pages)".to_string()));
        assert!(strings.contains(&"Document B: b.pdf (3 pages)".to_string()));
        assert!(strings.contains(&"Page count differs by 1".to_string()));
    }
}
