//! Compact, AI-facing views of a layout document.
//!
//! Two views are produced from a pre-order walk:
//! - a flat list of every non-empty text element with its row address, used
//!   for id-based edits;
//! - a nested structure tree annotated with layout metadata and per-slot
//!   role/size classification. Repeat lists are collapsed to their first
//!   repetition so near-identical subtrees are not repeated.

use serde::{Deserialize, Serialize};

use crate::core::path::DepthPath;
use crate::document::{Layout, LayoutDocument, Row};

/// Position of a text slot relative to its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotRole {
    Single,
    Left,
    Right,
    ListItem,
}

impl SlotRole {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotRole::Single => "single",
            SlotRole::Left => "left",
            SlotRole::Right => "right",
            SlotRole::ListItem => "list-item",
        }
    }
}

/// Soft length budget derived from the current text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotSize {
    Short,
    Medium,
    Long,
}

impl SlotSize {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotSize::Short => "short",
            SlotSize::Medium => "medium",
            SlotSize::Long => "long",
        }
    }

    pub fn classify(text: &str) -> Self {
        match text.chars().count() {
            0..=6 => SlotSize::Short,
            7..=20 => SlotSize::Medium,
            _ => SlotSize::Long,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSlot {
    pub elem_id: String,
    pub tag: String,
    pub text: String,
    pub role: SlotRole,
    pub slot_size: SlotSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatTextElement {
    pub elem_id: String,
    pub tag: String,
    pub text: String,
    pub row_depth: DepthPath,
    pub children_index: usize,
    pub row_tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureNode {
    pub id: String,
    pub tag: String,
    pub row_depth: DepthPath,
    pub layout: Layout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
    pub is_list: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_item_count: Option<usize>,
    pub slots: Vec<TextSlot>,
    pub children: Vec<StructureNode>,
}

/// Both serialized views, taken from the same document state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentView {
    pub elements: Vec<FlatTextElement>,
    pub structure: Vec<StructureNode>,
}

impl DocumentView {
    pub fn capture(document: &LayoutDocument) -> Self {
        Self {
            elements: extract_text_elements(document),
            structure: build_structure_tree(document),
        }
    }
}

/// Flat list of every non-empty text element, in pre-order.
///
/// Every repetition of a repeat list is included so each item stays
/// individually addressable by id.
pub fn extract_text_elements(document: &LayoutDocument) -> Vec<FlatTextElement> {
    let mut out = Vec::new();
    for (index, row) in document.rows.iter().enumerate() {
        collect_text_elements(document, row, DepthPath::top(index), &mut out);
    }
    out
}

fn collect_text_elements(
    document: &LayoutDocument,
    row: &Row,
    path: DepthPath,
    out: &mut Vec<FlatTextElement>,
) {
    for (children_index, elem_id) in row.children_ids.iter().enumerate() {
        let Some(text) = non_empty_text(document, elem_id) else {
            continue;
        };
        let tag = document
            .element(elem_id)
            .map(|elem| elem.tag.clone())
            .unwrap_or_default();
        out.push(FlatTextElement {
            elem_id: elem_id.clone(),
            tag,
            text: text.to_string(),
            row_depth: path.clone(),
            children_index,
            row_tag: row.tag.clone(),
        });
    }
    for (index, child) in row.children.iter().enumerate() {
        collect_text_elements(document, child, path.child(index), out);
    }
}

/// Nested structure tree mirroring the document's rows.
pub fn build_structure_tree(document: &LayoutDocument) -> Vec<StructureNode> {
    document
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| structure_node(document, row, DepthPath::top(index), false))
        .collect()
}

fn structure_node(
    document: &LayoutDocument,
    row: &Row,
    path: DepthPath,
    inside_repeat_list: bool,
) -> StructureNode {
    let slots = row_slots(document, row, inside_repeat_list);

    let children = if row.is_repeat_list {
        // Only the template repetition is described; it keeps index 0.
        row.children
            .first()
            .map(|first| vec![structure_node(document, first, path.child(0), true)])
            .unwrap_or_default()
    } else {
        row.children
            .iter()
            .enumerate()
            .map(|(index, child)| {
                structure_node(document, child, path.child(index), inside_repeat_list)
            })
            .collect()
    };

    StructureNode {
        id: row.id.clone(),
        tag: row.tag.clone(),
        row_depth: path,
        layout: row.style.layout,
        gap: row.style.gap,
        is_list: row.is_repeat_list,
        list_item_count: row.is_repeat_list.then_some(row.children.len()),
        slots,
        children,
    }
}

fn row_slots(document: &LayoutDocument, row: &Row, inside_repeat_list: bool) -> Vec<TextSlot> {
    let texts: Vec<(&String, &str)> = row
        .children_ids
        .iter()
        .filter_map(|id| non_empty_text(document, id).map(|text| (id, text)))
        .collect();
    // Roles follow the slots the service sees; hidden empty texts take no position.
    let sibling_count = texts.len();

    texts
        .into_iter()
        .enumerate()
        .map(|(position, (elem_id, text))| TextSlot {
            elem_id: elem_id.clone(),
            tag: document
                .element(elem_id)
                .map(|elem| elem.tag.clone())
                .unwrap_or_default(),
            text: text.to_string(),
            role: slot_role(row.style.layout, position, sibling_count, inside_repeat_list),
            slot_size: SlotSize::classify(text),
        })
        .collect()
}

fn slot_role(layout: Layout, position: usize, siblings: usize, inside_repeat_list: bool) -> SlotRole {
    if inside_repeat_list {
        return SlotRole::ListItem;
    }
    if layout == Layout::Row && siblings >= 2 {
        return match position {
            0 => SlotRole::Left,
            1 => SlotRole::Right,
            _ => SlotRole::Single,
        };
    }
    SlotRole::Single
}

fn non_empty_text<'a>(document: &'a LayoutDocument, elem_id: &str) -> Option<&'a str> {
    let elem = document.element(elem_id)?;
    if !elem.is_text() {
        return None;
    }
    elem.text().filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{DocBuilder, row, row_with_children};

    #[test]
    fn empty_text_is_excluded_from_both_views() {
        let mut a = row("A");
        a.children_ids = vec!["hi".to_string(), "blank".to_string()];
        let doc = DocBuilder::new()
            .text("hi", "body", "Hi")
            .text("blank", "body", "")
            .rows(vec![a])
            .build();

        let flat = extract_text_elements(&doc);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].elem_id, "hi");
        assert_eq!(flat[0].row_depth, DepthPath::top(0));

        let tree = build_structure_tree(&doc);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].slots.len(), 1);
    }

    #[test]
    fn row_layout_assigns_left_right_then_single() {
        let mut pair = row("pair");
        pair.style.layout = Layout::Row;
        pair.children_ids = vec!["l".to_string(), "r".to_string()];
        let mut triple = row("triple");
        triple.style.layout = Layout::Row;
        triple.children_ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let doc = DocBuilder::new()
            .text("l", "label", "Left")
            .text("r", "value", "Right")
            .text("a", "x", "A")
            .text("b", "x", "B")
            .text("c", "x", "C")
            .rows(vec![pair, triple])
            .build();

        let tree = build_structure_tree(&doc);
        let roles: Vec<SlotRole> = tree[0].slots.iter().map(|s| s.role).collect();
        assert_eq!(roles, vec![SlotRole::Left, SlotRole::Right]);
        let roles: Vec<SlotRole> = tree[1].slots.iter().map(|s| s.role).collect();
        assert_eq!(roles, vec![SlotRole::Left, SlotRole::Right, SlotRole::Single]);
    }

    #[test]
    fn roles_count_only_visible_slots() {
        let mut pair = row("pair");
        pair.style.layout = Layout::Row;
        pair.children_ids = vec!["blank".to_string(), "a".to_string(), "b".to_string()];
        let doc = DocBuilder::new()
            .text("blank", "x", "")
            .text("a", "x", "A")
            .text("b", "x", "B")
            .rows(vec![pair])
            .build();

        let tree = build_structure_tree(&doc);
        let slots: Vec<(&str, SlotRole)> = tree[0]
            .slots
            .iter()
            .map(|s| (s.elem_id.as_str(), s.role))
            .collect();
        assert_eq!(slots, vec![("a", SlotRole::Left), ("b", SlotRole::Right)]);
    }

    #[test]
    fn repeat_list_collapses_to_first_item_and_marks_list_items() {
        let mut item0 = row("item-0");
        item0.style.layout = Layout::Row;
        item0.children_ids = vec!["k0".to_string(), "v0".to_string()];
        let mut item1 = row("item-1");
        item1.children_ids = vec!["k1".to_string()];
        let mut list = row_with_children("list", vec![item0, item1]);
        list.is_repeat_list = true;
        let doc = DocBuilder::new()
            .text("k0", "key", "Name")
            .text("v0", "value", "Ada Lovelace, mathematician")
            .text("k1", "key", "Role")
            .rows(vec![list])
            .build();

        let tree = build_structure_tree(&doc);
        let list_node = &tree[0];
        assert!(list_node.is_list);
        assert_eq!(list_node.list_item_count, Some(2));
        assert_eq!(list_node.children.len(), 1);
        let item = &list_node.children[0];
        assert_eq!(item.row_depth, DepthPath::new(vec![0, 0]));
        assert!(item.slots.iter().all(|s| s.role == SlotRole::ListItem));
        assert_eq!(item.slots[1].slot_size, SlotSize::Long);

        // The flat list still carries every repetition.
        let flat = extract_text_elements(&doc);
        let ids: Vec<&str> = flat.iter().map(|e| e.elem_id.as_str()).collect();
        assert_eq!(ids, vec!["k0", "v0", "k1"]);
        assert_eq!(flat[2].row_depth, DepthPath::new(vec![0, 1]));
    }

    #[test]
    fn empty_rows_and_lists_still_produce_nodes() {
        let mut list = row("list");
        list.is_repeat_list = true;
        let doc = DocBuilder::new().rows(vec![row("spacer"), list]).build();

        let tree = build_structure_tree(&doc);
        assert_eq!(tree.len(), 2);
        assert!(tree[0].slots.is_empty());
        assert_eq!(tree[0].list_item_count, None);
        assert!(tree[1].is_list);
        assert_eq!(tree[1].list_item_count, Some(0));
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn slot_size_thresholds() {
        assert_eq!(SlotSize::classify("Hello!"), SlotSize::Short);
        assert_eq!(SlotSize::classify("Hello, world"), SlotSize::Medium);
        assert_eq!(SlotSize::classify("abcdefghijklmnopqrst"), SlotSize::Medium);
        assert_eq!(SlotSize::classify("abcdefghijklmnopqrstu"), SlotSize::Long);
    }
}
