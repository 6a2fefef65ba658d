//! Page tree operations: rotate, organize, crop.

use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use crate::command::{CropParams, OrganizeParams, RotateParams};
use crate::document::{self, materialize_inherited, rect_object};
use crate::error::PdfToolsError;

/// Object id of the root Pages node
pub(crate) fn root_pages_id(doc: &Document) -> Result<ObjectId, PdfToolsError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfToolsError::OperationError("No Root in trailer".into()))?;

    doc.get_dictionary(catalog_id)
        .map_err(|_| PdfToolsError::OperationError("Invalid catalog".into()))?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| PdfToolsError::OperationError("No Pages in catalog".into()))
}

/// Replace the page tree with a flat list of `page_refs` under the root node.
///
/// Inherited attributes are copied onto each page first so a page keeps its
/// geometry and resources after it leaves its original parent.
pub(crate) fn rebuild_page_tree(
    doc: &mut Document,
    page_refs: &[ObjectId],
) -> Result<(), PdfToolsError> {
    let pages_id = root_pages_id(doc)?;

    for &page_id in page_refs {
        materialize_inherited(doc, page_id)?;
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Parent", Object::Reference(pages_id));
    }

    if let Ok(Object::Dictionary(pages_dict)) = doc.get_object_mut(pages_id) {
        let kids = page_refs
            .iter()
            .map(|&id| Object::Reference(id))
            .collect::<Vec<_>>();
        pages_dict.set("Kids", Object::Array(kids));
        pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
        Ok(())
    } else {
        Err(PdfToolsError::OperationError(
            "Invalid pages dictionary".into(),
        ))
    }
}

fn selected_pages(
    all: &[ObjectId],
    wanted: Option<&[u32]>,
) -> Result<Vec<ObjectId>, PdfToolsError> {
    match wanted {
        None => Ok(all.to_vec()),
        Some(list) => list
            .iter()
            .map(|&page| {
                all.get((page as usize).wrapping_sub(1))
                    .copied()
                    .ok_or_else(|| {
                        PdfToolsError::InvalidRange(format!(
                            "Page {} does not exist in the PDF (total pages: {})",
                            page,
                            all.len()
                        ))
                    })
            })
            .collect(),
    }
}

/// Set an absolute rotation on every page, or on the listed pages.
pub fn rotate_pages(bytes: &[u8], params: &RotateParams) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc = document::load(bytes)?;
    let all = document::page_ids(&doc);
    let targets = selected_pages(&all, params.pages.as_deref())?;
    let degrees = params.degrees.rem_euclid(360);

    for page_id in targets {
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Rotate", Object::Integer(degrees));
    }
    debug!("Rotated pages to {} degrees", degrees);

    document::save(&mut doc)
}

/// Resolve a requested page order against the page count. Entries outside
/// `1..=page_count` are dropped; an empty request reverses the document.
pub fn resolve_page_order(order: &[i64], page_count: usize) -> Result<Vec<usize>, PdfToolsError> {
    if order.is_empty() {
        return Ok((1..=page_count).rev().collect());
    }
    let resolved: Vec<usize> = order
        .iter()
        .filter(|&&p| p >= 1 && p as usize <= page_count)
        .map(|&p| p as usize)
        .collect();
    if resolved.is_empty() {
        return Err(PdfToolsError::usage("Invalid page order provided"));
    }
    Ok(resolved)
}

/// Reorder pages. A page listed more than once is duplicated.
pub fn organize_pages(bytes: &[u8], params: &OrganizeParams) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc = document::load(bytes)?;
    let all = document::page_ids(&doc);
    let order = resolve_page_order(&params.page_order, all.len())?;

    let mut used = std::collections::HashSet::new();
    let mut new_refs = Vec::with_capacity(order.len());
    for page in order {
        let page_id = all[page - 1];
        if used.insert(page_id) {
            new_refs.push(page_id);
        } else {
            materialize_inherited(&mut doc, page_id)?;
            let copy = doc.get_object(page_id)?.clone();
            new_refs.push(doc.add_object(copy));
        }
    }

    rebuild_page_tree(&mut doc, &new_refs)?;
    doc.prune_objects();
    document::save(&mut doc)
}

/// Set a CropBox on every page, or on the listed pages.
pub fn crop_pages(bytes: &[u8], params: &CropParams) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc = document::load(bytes)?;
    let all = document::page_ids(&doc);
    let targets = selected_pages(&all, params.pages.as_deref())?;

    for (index, page_id) in targets.into_iter().enumerate() {
        let [x0, y0, x1, y1] = document::media_box(&doc, page_id);
        let (width, height) = (x1 - x0, y1 - y0);

        let left = x0 + params.x.unwrap_or(width * 0.1);
        let bottom = y0 + params.y.unwrap_or(height * 0.1);
        let right = (left + params.width.unwrap_or(width * 0.8)).min(x1);
        let top = (bottom + params.height.unwrap_or(height * 0.8)).min(y1);

        if left >= right || bottom >= top {
            return Err(PdfToolsError::InvalidRange(format!(
                "Crop area lies outside page {}",
                index + 1
            )));
        }

        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("CropBox", rect_object([left, bottom, right, top]));
    }

    document::save(&mut doc)
}
