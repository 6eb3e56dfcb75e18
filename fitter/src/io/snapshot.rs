//! Human-readable structure summary and final run snapshots.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::serializer::{DocumentView, StructureNode, TextSlot};
use crate::document::LayoutDocument;
use crate::io::run_log::FinalSnapshot;

const STRUCTURE_TEMPLATE: &str = include_str!("templates/structure.txt");

/// One pre-order line of the summary.
#[derive(Debug, Serialize)]
struct NodeLine {
    indent: String,
    path: String,
    detail: String,
    slots: Vec<String>,
}

fn flatten(nodes: &[StructureNode], depth: usize, out: &mut Vec<NodeLine>) {
    for node in nodes {
        out.push(NodeLine {
            indent: "  ".repeat(depth),
            path: node.row_depth.to_string(),
            detail: node_detail(node),
            slots: node.slots.iter().map(slot_detail).collect(),
        });
        flatten(&node.children, depth + 1, out);
    }
}

fn node_detail(node: &StructureNode) -> String {
    let mut detail = format!("{} #{} layout={}", node.tag, node.id, node.layout.as_str());
    if let Some(gap) = node.gap {
        detail.push_str(&format!(" gap={gap}"));
    }
    if let Some(count) = node.list_item_count {
        detail.push_str(&format!(" list({count})"));
    }
    detail
}

fn slot_detail(slot: &TextSlot) -> String {
    format!(
        "{} <{}> {}/{}: {:?}",
        slot.elem_id,
        slot.tag,
        slot.role.as_str(),
        slot.slot_size.as_str(),
        slot.text
    )
}

/// Render the structure tree as an indented outline.
pub fn render_structure(structure: &[StructureNode]) -> Result<String> {
    let mut lines = Vec::new();
    flatten(structure, 0, &mut lines);

    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("structure", STRUCTURE_TEMPLATE)
        .context("load structure template")?;
    let template = env.get_template("structure")?;
    let rendered = template
        .render(context! { nodes => lines })
        .context("render structure summary")?;
    Ok(rendered)
}

/// Capture the document for a run-finish notice.
pub fn build_final_snapshot(document: &LayoutDocument) -> Result<FinalSnapshot> {
    let view = DocumentView::capture(document);
    Ok(FinalSnapshot {
        structure: render_structure(&view.structure)?,
        elements: view.elements,
    })
}
