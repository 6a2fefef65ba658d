//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document.

use crate::document;
use crate::error::PdfToolsError;
use crate::pages::rebuild_page_tree;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. Load every input so that a corrupt file fails the whole merge
/// 3. Use the first document as the destination
/// 4. For each further source document:
///    a. Calculate ID offset to avoid conflicts
///    b. Import all objects with remapped IDs
///    c. Append pages to the destination
/// 5. Re-parent all pages under the destination root, prune, compress
pub fn merge_documents(documents: &[Vec<u8>]) -> Result<Vec<u8>, PdfToolsError> {
    if documents.is_empty() {
        return Err(PdfToolsError::OperationError("No documents to merge".into()));
    }

    let mut loaded_docs = Vec::with_capacity(documents.len());
    for (i, doc_bytes) in documents.iter().enumerate() {
        let doc = document::load(doc_bytes).map_err(|e| {
            PdfToolsError::ParseError(format!("Failed to load document {}: {}", i + 1, e))
        })?;
        if document::is_encrypted(&doc) {
            return Err(PdfToolsError::OperationError(format!(
                "Document {} is encrypted and cannot be merged",
                i + 1
            )));
        }
        loaded_docs.push(doc);
    }

    let mut dest = loaded_docs.remove(0);
    let mut dest_max_id = dest.max_id;
    let mut dest_page_refs = document::page_ids(&dest);

    for source in loaded_docs.into_iter() {
        let source_pages = document::page_ids(&source);
        let id_offset = dest_max_id;

        let mut remapped_objects = BTreeMap::new();
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            remapped_objects.insert(new_id, remap_object_refs(object, id_offset));
        }
        dest.objects.extend(remapped_objects);

        dest_page_refs.extend(
            source_pages
                .into_iter()
                .map(|old: ObjectId| (old.0 + id_offset, old.1)),
        );

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;
    rebuild_page_tree(&mut dest, &dest_page_refs)?;

    dest.prune_objects();
    dest.compress();

    document::save(&mut dest)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}
