//! In-memory layout document: a forest of rows plus the element table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::path::DepthPath;

/// Key of the text payload inside an element's `attrs` bag.
pub const TEXT_ATTR: &str = "text";

/// Flex direction of a row container.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Row,
    #[default]
    Column,
}

impl Layout {
    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Row => "row",
            Layout::Column => "column",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RowStyle {
    pub layout: Layout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
}

/// A layout container node.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub style: RowStyle,
    #[serde(default)]
    pub is_repeat_list: bool,
    /// Leaf element references, in display order.
    #[serde(default)]
    pub children_ids: Vec<String>,
    #[serde(default)]
    pub children: Vec<Row>,
}

impl Row {
    /// True when the row holds neither elements nor child rows.
    pub fn is_empty(&self) -> bool {
        self.children_ids.is_empty() && self.children.is_empty()
    }

    /// Visit every element id referenced by this row and its descendants.
    pub fn collect_element_ids(&self, out: &mut Vec<String>) {
        out.extend(self.children_ids.iter().cloned());
        for child in &self.children {
            child.collect_element_ids(out);
        }
    }

    fn collect_row_ids(&self, out: &mut Vec<String>) {
        out.push(self.id.clone());
        for child in &self.children {
            child.collect_row_ids(out);
        }
    }
}

/// Element kind discriminator (`elementRef`).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ElementKind {
    Text,
    Image,
    Shape,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    pub element_ref: ElementKind,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

impl Element {
    pub fn is_text(&self) -> bool {
        self.element_ref == ElementKind::Text
    }

    /// Text payload, or `None` when the element carries no string `text` attribute.
    pub fn text(&self) -> Option<&str> {
        self.attrs.get(TEXT_ATTR).and_then(Value::as_str)
    }

    pub fn set_text(&mut self, text: &str) {
        self.attrs
            .insert(TEXT_ATTR.to_string(), Value::String(text.to_string()));
    }
}

/// Per-tag style defaults applied to newly created elements.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Theme {
    pub styles: BTreeMap<String, Map<String, Value>>,
}

/// A template document: top-level rows, element records and theme.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDocument {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub elements: BTreeMap<String, Element>,
    #[serde(default)]
    pub theme: Theme,
    /// Row currently selected for list operations.
    #[serde(skip)]
    pub active_address: Option<DepthPath>,
}

impl LayoutDocument {
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// All row ids in pre-order.
    pub fn row_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for row in &self.rows {
            row.collect_row_ids(&mut ids);
        }
        ids
    }

    /// Return an id of the form `{prefix}-{n}` unused by any row or element.
    pub(crate) fn fresh_id(&self, prefix: &str, taken: &[String]) -> String {
        let rows = self.row_ids();
        let mut n = self.elements.len() + rows.len() + taken.len() + 1;
        loop {
            let candidate = format!("{prefix}-{n}");
            if !self.elements.contains_key(&candidate)
                && !rows.contains(&candidate)
                && !taken.contains(&candidate)
            {
                return candidate;
            }
            n += 1;
        }
    }
}
