//! PDF Split algorithm
//!
//! Extracts pages from a PDF by deleting everything that is not wanted.

use crate::document;
use crate::error::PdfToolsError;
use lopdf::Document;
use std::collections::HashSet;
use std::ops::RangeInclusive;

/// One output of a split: its name tag and PDF bytes
pub type SplitPart = (String, Vec<u8>);

/// Parse page range groups like "1-3, 5, 8-10". Each comma-separated segment
/// is one group, kept in the order given.
pub fn parse_range_groups(input: &str) -> Result<Vec<RangeInclusive<u32>>, PdfToolsError> {
    let mut groups = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let group = if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start
                .trim()
                .parse()
                .map_err(|_| PdfToolsError::InvalidRange(format!("Invalid start: {}", start)))?;
            let end: u32 = end
                .trim()
                .parse()
                .map_err(|_| PdfToolsError::InvalidRange(format!("Invalid end: {}", end)))?;

            if start > end {
                return Err(PdfToolsError::InvalidRange(format!(
                    "Start {} > end {}",
                    start, end
                )));
            }
            start..=end
        } else {
            let page: u32 = part
                .parse()
                .map_err(|_| PdfToolsError::InvalidRange(format!("Invalid page: {}", part)))?;
            page..=page
        };

        if *group.start() == 0 {
            return Err(PdfToolsError::InvalidRange(
                "Page numbers must be >= 1".into(),
            ));
        }
        groups.push(group);
    }

    if groups.is_empty() {
        return Err(PdfToolsError::InvalidRange("No pages specified".into()));
    }
    Ok(groups)
}

/// Split a PDF, extracting only the specified pages (1-indexed)
pub fn split_document(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfToolsError> {
    let doc = document::load(bytes)?;
    extract_pages(&doc, pages)
}

fn extract_pages(doc: &Document, pages: &[u32]) -> Result<Vec<u8>, PdfToolsError> {
    if pages.is_empty() {
        return Err(PdfToolsError::InvalidRange("No pages specified".into()));
    }

    if pages.contains(&0) {
        return Err(PdfToolsError::InvalidRange(
            "Page numbers must be >= 1".into(),
        ));
    }

    let page_count = doc.get_pages().len() as u32;

    for &page in pages {
        if page > page_count {
            return Err(PdfToolsError::InvalidRange(format!(
                "Page {} does not exist in the PDF (total pages: {})",
                page, page_count
            )));
        }
    }

    let mut new_doc = doc.clone();

    let pages_to_keep: HashSet<u32> = pages.iter().copied().collect();
    let mut pages_to_delete: Vec<u32> = (1..=page_count)
        .filter(|p| !pages_to_keep.contains(p))
        .collect();

    // Delete in reverse order so earlier page numbers stay valid
    pages_to_delete.reverse();
    for page_num in pages_to_delete {
        new_doc.delete_pages(&[page_num]);
    }

    new_doc.prune_objects();
    new_doc.compress();

    document::save(&mut new_doc)
}

/// Split into one document per page, or one document per range group when
/// `ranges` is given.
pub fn split_pages(bytes: &[u8], ranges: Option<&str>) -> Result<Vec<SplitPart>, PdfToolsError> {
    let doc = document::load(bytes)?;
    let page_count = doc.get_pages().len() as u32;
    if page_count == 0 {
        return Err(PdfToolsError::OperationError("PDF has no pages".into()));
    }

    let groups = match ranges.map(str::trim).filter(|r| !r.is_empty()) {
        Some(spec) => parse_range_groups(spec)?,
        None => (1..=page_count).map(|p| p..=p).collect(),
    };

    // Bound every group by the page count before any range is expanded
    if let Some(group) = groups.iter().find(|g| *g.end() > page_count) {
        return Err(PdfToolsError::InvalidRange(format!(
            "Page {} does not exist in the PDF (total pages: {})",
            group.end(),
            page_count
        )));
    }

    groups
        .into_iter()
        .map(|group| {
            let tag = if group.start() == group.end() {
                format!("page-{}", group.start())
            } else {
                format!("pages-{}-{}", group.start(), group.end())
            };
            let pages: Vec<u32> = group.collect();
            extract_pages(&doc, &pages).map(|bytes| (tag, bytes))
        })
        .collect()
}
