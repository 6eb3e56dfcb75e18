//! Semantic document invariants not expressible via JSON Schema.

use std::collections::HashSet;

use crate::core::path::DepthPath;
use crate::document::{LayoutDocument, Row};

/// Check semantic invariants:
/// - No duplicate row ids
/// - Every `childrenIds` entry names an existing element
/// - No element is placed in more than one row slot
/// - Element records are keyed by their own id
pub fn validate_invariants(document: &LayoutDocument) -> Vec<String> {
    let mut errors = Vec::new();
    let mut rows_seen = HashSet::new();
    let mut placed = HashSet::new();

    for (key, elem) in &document.elements {
        if key != &elem.id {
            errors.push(format!("element keyed '{}' has id '{}'", key, elem.id));
        }
    }

    for (index, row) in document.rows.iter().enumerate() {
        validate_row(
            document,
            row,
            &DepthPath::top(index),
            &mut rows_seen,
            &mut placed,
            &mut errors,
        );
    }
    errors
}

fn validate_row(
    document: &LayoutDocument,
    row: &Row,
    path: &DepthPath,
    rows_seen: &mut HashSet<String>,
    placed: &mut HashSet<String>,
    errors: &mut Vec<String>,
) {
    if !rows_seen.insert(row.id.clone()) {
        errors.push(format!("duplicate row id '{}' at {}", row.id, path));
    }

    for elem_id in &row.children_ids {
        if !document.elements.contains_key(elem_id) {
            errors.push(format!("{}: unknown element '{}'", path, elem_id));
        }
        if !placed.insert(elem_id.clone()) {
            errors.push(format!("{}: element '{}' placed twice", path, elem_id));
        }
    }

    for (index, child) in row.children.iter().enumerate() {
        validate_row(document, child, &path.child(index), rows_seen, placed, errors);
    }
}
