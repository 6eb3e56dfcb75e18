//! Document owner abstraction for tree mutation primitives.
//!
//! The [`DocumentOwner`] trait decouples plan execution from whoever owns the
//! live document. [`LayoutDocument`] implements it in memory; tests wrap it to
//! inject primitive failures.

use std::collections::HashSet;

use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::core::path::{DepthPath, resolve_row, resolve_row_mut};
use crate::document::{Element, ElementKind, LayoutDocument, Row};

/// Mutation primitives the executor relies on.
pub trait DocumentOwner {
    /// Read-only view used for serialization.
    fn document(&self) -> &LayoutDocument;

    fn get_layer(&self, elem_id: &str) -> Option<&Element> {
        self.document().element(elem_id)
    }

    fn resolve_row(&self, path: &DepthPath) -> Option<&Row> {
        resolve_row(&self.document().rows, path)
    }

    fn style_for_tag(&self, tag: &str) -> Option<Map<String, Value>> {
        self.document().theme.styles.get(tag).cloned()
    }

    fn change_element_text(&mut self, elem_id: &str, text: &str) -> Result<()>;

    /// Delete all `elem_ids` in one call, pruning rows left empty. Returns the
    /// number of element records removed.
    fn delete_elements_batch(&mut self, elem_ids: &[String]) -> Result<usize>;

    fn set_active_address(&mut self, path: &DepthPath) -> Result<()>;

    /// Grow or shrink the repeat list at `address` to `target_count` items.
    fn resize_repeat_list(&mut self, target_count: usize, address: &DepthPath) -> Result<()>;

    /// Create a text element in the row at `address`; `None` if no id was assigned.
    fn create_text_element(
        &mut self,
        tag: &str,
        attrs: Map<String, Value>,
        address: &DepthPath,
        order: Option<usize>,
    ) -> Result<Option<String>>;
}

impl DocumentOwner for LayoutDocument {
    fn document(&self) -> &LayoutDocument {
        self
    }

    fn change_element_text(&mut self, elem_id: &str, text: &str) -> Result<()> {
        let elem = self
            .elements
            .get_mut(elem_id)
            .ok_or_else(|| anyhow!("element '{elem_id}' not found"))?;
        if elem.element_ref != ElementKind::Text {
            bail!("element '{elem_id}' is not a text element");
        }
        elem.set_text(text);
        Ok(())
    }

    #[instrument(skip_all, fields(count = elem_ids.len()))]
    fn delete_elements_batch(&mut self, elem_ids: &[String]) -> Result<usize> {
        // Validate the whole batch before touching anything.
        if let Some(missing) = elem_ids.iter().find(|id| !self.elements.contains_key(*id)) {
            bail!("element '{missing}' not found");
        }
        let targets: HashSet<&str> = elem_ids.iter().map(String::as_str).collect();

        self.rows.retain_mut(|row| !prune_deleted(row, &targets));
        let mut removed = 0;
        for id in &targets {
            if self.elements.remove(*id).is_some() {
                removed += 1;
            }
        }
        self.active_address = None;
        debug!(removed, "deleted elements");
        Ok(removed)
    }

    fn set_active_address(&mut self, path: &DepthPath) -> Result<()> {
        if resolve_row(&self.rows, path).is_none() {
            bail!("no row at {path}");
        }
        self.active_address = Some(path.clone());
        Ok(())
    }

    #[instrument(skip_all, fields(target_count, address = %address))]
    fn resize_repeat_list(&mut self, target_count: usize, address: &DepthPath) -> Result<()> {
        if target_count == 0 {
            bail!("target count must be at least 1");
        }
        let row =
            resolve_row(&self.rows, address).ok_or_else(|| anyhow!("no row at {address}"))?;
        if !row.is_repeat_list {
            bail!("row '{}' at {} is not a repeat list", row.id, address);
        }
        let template = row
            .children
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("repeat list '{}' has no item to clone", row.id))?;
        let current = row.children.len();

        if target_count < current {
            let list = resolve_row_mut(&mut self.rows, address)
                .ok_or_else(|| anyhow!("no row at {address}"))?;
            let mut dropped = Vec::new();
            for item in list.children.drain(target_count..) {
                item.collect_element_ids(&mut dropped);
            }
            for id in &dropped {
                self.elements.remove(id);
            }
        } else if target_count > current {
            let mut taken = Vec::new();
            let clones: Vec<Row> = (current..target_count)
                .map(|_| self.clone_with_fresh_ids(&template, &mut taken))
                .collect();
            let list = resolve_row_mut(&mut self.rows, address)
                .ok_or_else(|| anyhow!("no row at {address}"))?;
            list.children.extend(clones);
        }
        debug!(from = current, to = target_count, "resized repeat list");
        Ok(())
    }

    fn create_text_element(
        &mut self,
        tag: &str,
        attrs: Map<String, Value>,
        address: &DepthPath,
        order: Option<usize>,
    ) -> Result<Option<String>> {
        if resolve_row(&self.rows, address).is_none() {
            bail!("no row at {address}");
        }
        let id = self.fresh_id("text", &[]);
        let row = resolve_row_mut(&mut self.rows, address)
            .ok_or_else(|| anyhow!("no row at {address}"))?;
        let index = order.map_or(row.children_ids.len(), |o| o.min(row.children_ids.len()));
        row.children_ids.insert(index, id.clone());
        self.elements.insert(
            id.clone(),
            Element {
                id: id.clone(),
                element_ref: ElementKind::Text,
                tag: tag.to_string(),
                attrs,
            },
        );
        Ok(Some(id))
    }
}

impl LayoutDocument {
    /// Deep-copy a repetition, giving every row and element a new id.
    fn clone_with_fresh_ids(&mut self, template: &Row, taken: &mut Vec<String>) -> Row {
        let id = self.fresh_id(&template.id, taken);
        taken.push(id.clone());

        let mut children_ids = Vec::with_capacity(template.children_ids.len());
        for elem_id in &template.children_ids {
            let Some(elem) = self.elements.get(elem_id).cloned() else {
                continue;
            };
            let new_id = self.fresh_id(&elem.id, taken);
            self.elements.insert(
                new_id.clone(),
                Element {
                    id: new_id.clone(),
                    ..elem
                },
            );
            children_ids.push(new_id);
        }

        let children = template
            .children
            .iter()
            .map(|child| self.clone_with_fresh_ids(child, taken))
            .collect();

        Row {
            id,
            children_ids,
            children,
            ..template.clone()
        }
    }
}

/// Drop references to `targets` below `row`. Returns true if `row` lost
/// content and is now empty, so the caller should remove it.
fn prune_deleted(row: &mut Row, targets: &HashSet<&str>) -> bool {
    let ids_before = row.children_ids.len();
    row.children_ids.retain(|id| !targets.contains(id.as_str()));
    let rows_before = row.children.len();
    row.children.retain_mut(|child| !prune_deleted(child, targets));

    let changed = row.children_ids.len() != ids_before || row.children.len() != rows_before;
    changed && row.is_empty()
}
