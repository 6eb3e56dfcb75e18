//! Content-plan execution against a [`DocumentOwner`].
//!
//! Operations run in a fixed order: list resizes, text replacements, one
//! batch delete, then inserts. Resizes go first because every other address
//! in the plan refers to the post-resize shape; inserts go last so new
//! elements can never be deletion targets of the same plan.
//!
//! No single operation aborts the plan. Failures are recorded in the
//! returned [`ExecutionReport`] and execution moves on.

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::core::resolver::{MissingBlockIndex, PositionHeuristic, PositionResolver, Resolution};
use crate::core::types::{
    AddOp, ContentPlan, ExecutionReport, LayoutPlan, ListAdjust, ReplaceOp, Step, StepErrorKind,
};
use crate::document::TEXT_ATTR;
use crate::io::config::FitterConfig;
use crate::io::document_owner::DocumentOwner;

/// Style key that always receives a value on inserted text.
pub const LINE_HEIGHT_ATTR: &str = "lineHeight";

#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteOptions {
    pub default_line_height: f64,
    pub missing_block_index: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            default_line_height: 1.5,
            missing_block_index: true,
        }
    }
}

impl ExecuteOptions {
    pub fn from_config(config: &FitterConfig) -> Self {
        Self {
            default_line_height: config.default_line_height,
            missing_block_index: config.heuristics.missing_block_index,
        }
    }

    pub fn resolver(&self) -> PositionResolver {
        let mut heuristics: Vec<Box<dyn PositionHeuristic>> = Vec::new();
        if self.missing_block_index {
            heuristics.push(Box::new(MissingBlockIndex));
        }
        PositionResolver::new(heuristics)
    }
}

/// Execute a content plan and its companion layout plan.
pub fn execute_plans<D: DocumentOwner>(
    owner: &mut D,
    content: &ContentPlan,
    layout: &LayoutPlan,
    options: &ExecuteOptions,
) -> ExecutionReport {
    let mut report = execute_content_plan(owner, content, options);
    report.layout_adjusted = apply_layout_plan(layout);
    report
}

/// Apply `plan` to the document and report per-operation outcomes.
#[instrument(skip_all, fields(
    list_adjust = plan.list_adjust.len(),
    replace = plan.replace.len(),
    delete = plan.delete.len(),
    add = plan.add.len(),
))]
pub fn execute_content_plan<D: DocumentOwner>(
    owner: &mut D,
    plan: &ContentPlan,
    options: &ExecuteOptions,
) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    for op in &plan.list_adjust {
        adjust_list(owner, op, &mut report);
    }
    for op in &plan.replace {
        replace_text(owner, op, &mut report);
    }
    if !plan.delete.is_empty() {
        delete_batch(owner, &plan.delete, &mut report);
    }
    if !plan.add.is_empty() {
        let resolver = options.resolver();
        for op in &plan.add {
            add_text(owner, &resolver, op, options, &mut report);
        }
    }

    debug!(
        replaced = report.replaced,
        deleted = report.deleted,
        added = report.added,
        list_adjusted = report.list_adjusted,
        errors = report.errors.len(),
        "content plan executed"
    );
    report
}

/// Layout adjustments are accepted but disabled; nothing is mutated.
///
/// Returns the number of adjustments applied, which is always zero.
pub fn apply_layout_plan(plan: &LayoutPlan) -> usize {
    if !plan.is_empty() {
        debug!(skipped = plan.len(), "layout adjustments are disabled");
    }
    0
}

fn adjust_list<D: DocumentOwner>(owner: &mut D, op: &ListAdjust, report: &mut ExecutionReport) {
    let result = owner
        .set_active_address(&op.row_depth)
        .and_then(|()| owner.resize_repeat_list(op.target_count, &op.row_depth));
    match result {
        Ok(()) => report.list_adjusted += 1,
        Err(err) => {
            warn!(path = %op.row_depth, target = op.target_count, err = %err, "list adjust failed");
            report.record(
                Step::ListAdjust,
                StepErrorKind::Primitive,
                format!(
                    "resize list at {} to {} items failed: {err:#}",
                    op.row_depth, op.target_count
                ),
            );
        }
    }
}

fn replace_text<D: DocumentOwner>(owner: &mut D, op: &ReplaceOp, report: &mut ExecutionReport) {
    let Some(elem) = owner.get_layer(&op.elem_id) else {
        report.record(
            Step::Replace,
            StepErrorKind::ElementNotFound,
            format!("element '{}' not found", op.elem_id),
        );
        return;
    };
    if !elem.is_text() {
        report.record(
            Step::Replace,
            StepErrorKind::NotText,
            format!("element '{}' is not a text element", op.elem_id),
        );
        return;
    }
    match owner.change_element_text(&op.elem_id, &op.new_text) {
        Ok(()) => report.replaced += 1,
        Err(err) => report.record(
            Step::Replace,
            StepErrorKind::Primitive,
            format!("change text of '{}': {err:#}", op.elem_id),
        ),
    }
}

fn delete_batch<D: DocumentOwner>(
    owner: &mut D,
    elem_ids: &[String],
    report: &mut ExecutionReport,
) {
    // Unknown ids are reported once and left out so the rest still go.
    let (known, unknown): (Vec<String>, Vec<String>) = elem_ids
        .iter()
        .cloned()
        .partition(|id| owner.get_layer(id).is_some());
    if !unknown.is_empty() {
        report.record(
            Step::Delete,
            StepErrorKind::ElementNotFound,
            format!("elements not found: {}", unknown.join(", ")),
        );
    }
    if known.is_empty() {
        return;
    }

    match owner.delete_elements_batch(&known) {
        Ok(removed) => report.deleted += removed,
        Err(err) => {
            warn!(count = known.len(), err = %err, "batch delete failed");
            report.record(
                Step::Delete,
                StepErrorKind::Primitive,
                format!("delete {} elements failed: {err:#}", known.len()),
            );
        }
    }
}

fn add_text<D: DocumentOwner>(
    owner: &mut D,
    resolver: &PositionResolver,
    op: &AddOp,
    options: &ExecuteOptions,
    report: &mut ExecutionReport,
) {
    let Some(resolution) = resolver.resolve(&owner.document().rows, &op.position) else {
        report.record(
            Step::Add,
            StepErrorKind::UnresolvedPosition,
            format!("cannot find row for position {}", op.position),
        );
        return;
    };
    match &resolution {
        Resolution::Exact(_) => {}
        Resolution::Heuristic { name, path } => {
            debug!(position = %op.position, resolved = %path, heuristic = name, "position rewritten");
        }
        Resolution::Ancestor(path) => {
            debug!(position = %op.position, resolved = %path, "position fell back to ancestor");
        }
    }

    let attrs = new_text_attrs(owner, op, options.default_line_height);
    match owner.create_text_element(&op.tag, attrs, resolution.path(), op.order) {
        Ok(Some(id)) => {
            debug!(id = %id, position = %resolution.path(), "inserted text element");
            report.added += 1;
        }
        Ok(None) => report.record(
            Step::Add,
            StepErrorKind::Primitive,
            format!("element creation returned no id for position {}", op.position),
        ),
        Err(err) => report.record(
            Step::Add,
            StepErrorKind::Primitive,
            format!("create element for position {}: {err:#}", op.position),
        ),
    }
}

/// Theme style for the tag over a default line height, plus the text.
fn new_text_attrs<D: DocumentOwner>(
    owner: &D,
    op: &AddOp,
    default_line_height: f64,
) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert(LINE_HEIGHT_ATTR.to_string(), Value::from(default_line_height));
    if let Some(style) = owner.style_for_tag(&op.tag) {
        attrs.extend(style);
    }
    attrs.insert(TEXT_ATTR.to_string(), Value::String(op.text.clone()));
    attrs
}

#[cfg(test)]
mod tests {
    use anyhow::{Result, bail};
    use serde_json::json;

    use super::*;
    use crate::core::path::{DepthPath, resolve_row};
    use crate::core::types::{AnalysisResult, FlexDirectionAdjust, GapAdjust};
    use crate::document::{Element, Layout, LayoutDocument};
    use crate::test_support::{DocBuilder, row, row_with_children, with_elements};

    fn replace(elem_id: &str, new_text: &str) -> ReplaceOp {
        ReplaceOp {
            elem_id: elem_id.to_string(),
            new_text: new_text.to_string(),
        }
    }

    fn add(position: Vec<usize>, tag: &str, text: &str) -> AddOp {
        AddOp {
            position: DepthPath::new(position),
            tag: tag.to_string(),
            text: text.to_string(),
            order: None,
        }
    }

    fn texts_at(doc: &LayoutDocument, path: Vec<usize>) -> Vec<String> {
        resolve_row(&doc.rows, &DepthPath::new(path))
            .expect("row")
            .children_ids
            .iter()
            .filter_map(|id| doc.element(id).and_then(Element::text))
            .map(str::to_string)
            .collect()
    }

    fn three_texts() -> LayoutDocument {
        DocBuilder::new()
            .text("a", "title", "Alpha")
            .text("b", "body", "Beta")
            .text("c", "note", "Gamma")
            .text("d", "note", "Delta")
            .rows(vec![
                with_elements(row("top"), &["a", "b"]),
                with_elements(row("bottom"), &["c", "d"]),
            ])
            .build()
    }

    /// Block row `[0]` holding one section `[0,0]` with three rows below it.
    fn nested_blocks() -> LayoutDocument {
        DocBuilder::new()
            .rows(vec![row_with_children(
                "block",
                vec![row_with_children(
                    "section",
                    vec![row("s0"), row("s1"), row("s2")],
                )],
            )])
            .build()
    }

    #[test]
    fn replace_order_does_not_matter() {
        let forward = ContentPlan {
            replace: vec![replace("a", "A"), replace("c", "C")],
            delete: vec!["d".to_string()],
            ..ContentPlan::default()
        };
        let backward = ContentPlan {
            replace: vec![replace("c", "C"), replace("a", "A")],
            ..forward.clone()
        };

        let mut first = three_texts();
        let mut second = three_texts();
        let r1 = execute_content_plan(&mut first, &forward, &ExecuteOptions::default());
        let r2 = execute_content_plan(&mut second, &backward, &ExecuteOptions::default());

        assert_eq!(first, second);
        assert_eq!(r1, r2);
        assert_eq!(r1.replaced, 2);
        assert_eq!(r1.deleted, 1);
    }

    #[test]
    fn replace_is_idempotent() {
        let plan = ContentPlan {
            replace: vec![replace("b", "Shorter")],
            ..ContentPlan::default()
        };
        let mut doc = three_texts();
        execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());
        let once = doc.clone();
        execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());
        assert_eq!(doc, once);
    }

    #[test]
    fn list_resize_runs_before_add_resolution() {
        let mut list = row_with_children("list", vec![with_elements(row("item"), &["name"])]);
        list.is_repeat_list = true;
        let fixture = DocBuilder::new()
            .text("name", "name", "Ada")
            .rows(vec![list])
            .build();
        let insert = add(vec![0, 2], "caption", "third item");

        let mut doc = fixture.clone();
        let plan = ContentPlan {
            list_adjust: vec![ListAdjust {
                row_depth: DepthPath::top(0),
                target_count: 3,
            }],
            add: vec![insert.clone()],
            ..ContentPlan::default()
        };
        let report = execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.list_adjusted, 1);
        assert_eq!(doc.rows[0].children.len(), 3);
        assert_eq!(texts_at(&doc, vec![0, 2]), vec!["Ada", "third item"]);

        // Resolving the add against the pre-resize shape lands elsewhere.
        let mut early = fixture;
        let add_only = ContentPlan {
            add: vec![insert],
            ..ContentPlan::default()
        };
        execute_content_plan(&mut early, &add_only, &ExecuteOptions::default());
        assert_eq!(texts_at(&early, vec![0]), vec!["third item"]);
        assert_eq!(texts_at(&early, vec![0, 0]), vec!["Ada"]);
    }

    #[test]
    fn add_uses_missing_block_index_rewrite() {
        let mut doc = nested_blocks();
        let plan = ContentPlan {
            add: vec![add(vec![0, 2], "body", "rewritten")],
            ..ContentPlan::default()
        };
        let report = execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());
        assert_eq!(report.added, 1);
        assert_eq!(texts_at(&doc, vec![0, 0, 2]), vec!["rewritten"]);
    }

    #[test]
    fn add_falls_back_to_longest_existing_prefix() {
        let mut doc = DocBuilder::new()
            .rows(vec![row_with_children("block", vec![row("section")])])
            .build();
        let plan = ContentPlan {
            add: vec![add(vec![0, 0, 5], "body", "fallback")],
            ..ContentPlan::default()
        };
        let report = execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());
        assert_eq!(report.added, 1);
        assert_eq!(texts_at(&doc, vec![0, 0]), vec!["fallback"]);
    }

    #[test]
    fn unresolved_add_is_recorded_and_creates_nothing() {
        let mut doc = nested_blocks();
        let plan = ContentPlan {
            add: vec![add(vec![4, 1], "body", "lost"), add(vec![7], "body", "lost")],
            ..ContentPlan::default()
        };
        let report = execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());

        assert_eq!(report.added, 0);
        assert!(doc.elements.is_empty());
        let messages: Vec<&str> = report.errors.iter().map(|e| e.error.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "cannot find row for position [4,1]",
                "cannot find row for position [7]",
            ]
        );
        assert!(report.has_unresolved_add());
    }

    #[test]
    fn disabled_heuristic_skips_to_ancestor() {
        let mut doc = nested_blocks();
        let plan = ContentPlan {
            add: vec![add(vec![0, 2], "body", "ancestor")],
            ..ContentPlan::default()
        };
        let options = ExecuteOptions {
            missing_block_index: false,
            ..ExecuteOptions::default()
        };
        execute_content_plan(&mut doc, &plan, &options);
        assert_eq!(texts_at(&doc, vec![0]), vec!["ancestor"]);
    }

    #[test]
    fn failing_replace_does_not_block_others() {
        let mut doc = three_texts();
        let plan = ContentPlan {
            replace: vec![replace("a", "A"), replace("ghost", "?"), replace("c", "C")],
            ..ContentPlan::default()
        };
        let report = execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());

        assert_eq!(report.replaced, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].step, Step::Replace);
        assert_eq!(report.errors[0].kind, StepErrorKind::ElementNotFound);
        assert_eq!(texts_at(&doc, vec![0]), vec!["A", "Beta"]);
    }

    #[test]
    fn replace_rejects_non_text_elements() {
        let mut doc = DocBuilder::new()
            .image("logo")
            .rows(vec![with_elements(row("r"), &["logo"])])
            .build();
        let plan = ContentPlan {
            replace: vec![replace("logo", "text")],
            ..ContentPlan::default()
        };
        let report = execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());
        assert_eq!(report.errors[0].kind, StepErrorKind::NotText);
        assert_eq!(report.replaced, 0);
    }

    #[test]
    fn inserted_text_merges_theme_style_over_default_line_height() {
        let mut doc = DocBuilder::new()
            .style("title", "fontSize", json!(32))
            .style("title", LINE_HEIGHT_ATTR, json!(1.2))
            .rows(vec![row("r")])
            .build();
        let plan = ContentPlan {
            add: vec![add(vec![0], "title", "Styled"), add(vec![0], "body", "Plain")],
            ..ContentPlan::default()
        };
        execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());

        let ids = &doc.rows[0].children_ids;
        let styled = &doc.element(&ids[0]).expect("styled").attrs;
        assert_eq!(styled["fontSize"], json!(32));
        assert_eq!(styled[LINE_HEIGHT_ATTR], json!(1.2));
        assert_eq!(styled[TEXT_ATTR], json!("Styled"));
        let plain = &doc.element(&ids[1]).expect("plain").attrs;
        assert_eq!(plain[LINE_HEIGHT_ATTR], json!(1.5));
    }

    #[test]
    fn list_adjust_failure_names_path_and_count() {
        let mut doc = nested_blocks();
        let plan = ContentPlan {
            list_adjust: vec![
                ListAdjust {
                    row_depth: DepthPath::new(vec![5]),
                    target_count: 3,
                },
                ListAdjust {
                    row_depth: DepthPath::new(vec![0, 0]),
                    target_count: 2,
                },
            ],
            ..ContentPlan::default()
        };
        let report = execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());

        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|e| e.step == Step::ListAdjust));
        assert!(report.errors[0].error.contains("[5]"));
        assert!(report.errors[0].error.contains("3 items"));
        assert!(report.errors[1].error.contains("not a repeat list"));
        assert_eq!(report.list_adjusted, 0);
    }

    #[test]
    fn layout_plan_is_accepted_without_mutation() {
        let mut doc = three_texts();
        let before = doc.clone();
        let layout = LayoutPlan {
            adjust_flex_direction: vec![FlexDirectionAdjust {
                row_depth: DepthPath::top(0),
                direction: Layout::Row,
            }],
            adjust_gap: vec![GapAdjust {
                row_depth: DepthPath::top(1),
                gap: 24.0,
            }],
            adjust_align_items: Vec::new(),
        };

        let report = execute_plans(
            &mut doc,
            &ContentPlan::default(),
            &layout,
            &ExecuteOptions::default(),
        );

        assert_eq!(doc, before);
        assert_eq!(report.layout_adjusted, 0);
        assert!(report.errors.is_empty());
    }

    /// Owner whose delete and create primitives misbehave on request.
    struct FlakyOwner {
        inner: LayoutDocument,
        fail_delete: bool,
        no_id_on_create: bool,
    }

    impl DocumentOwner for FlakyOwner {
        fn document(&self) -> &LayoutDocument {
            &self.inner
        }

        fn change_element_text(&mut self, elem_id: &str, text: &str) -> Result<()> {
            self.inner.change_element_text(elem_id, text)
        }

        fn delete_elements_batch(&mut self, elem_ids: &[String]) -> Result<usize> {
            if self.fail_delete {
                bail!("owner is read-only");
            }
            self.inner.delete_elements_batch(elem_ids)
        }

        fn set_active_address(&mut self, path: &DepthPath) -> Result<()> {
            self.inner.set_active_address(path)
        }

        fn resize_repeat_list(&mut self, target_count: usize, address: &DepthPath) -> Result<()> {
            self.inner.resize_repeat_list(target_count, address)
        }

        fn create_text_element(
            &mut self,
            tag: &str,
            attrs: Map<String, Value>,
            address: &DepthPath,
            order: Option<usize>,
        ) -> Result<Option<String>> {
            if self.no_id_on_create {
                return Ok(None);
            }
            self.inner.create_text_element(tag, attrs, address, order)
        }
    }

    #[test]
    fn batch_delete_failure_is_recorded_once() {
        let mut owner = FlakyOwner {
            inner: three_texts(),
            fail_delete: true,
            no_id_on_create: false,
        };
        let plan = ContentPlan {
            replace: vec![replace("a", "A")],
            delete: vec!["b".to_string(), "c".to_string(), "d".to_string()],
            add: vec![add(vec![1], "note", "kept going")],
            ..ContentPlan::default()
        };
        let report = execute_content_plan(&mut owner, &plan, &ExecuteOptions::default());

        assert_eq!(report.errors_for(Step::Delete).count(), 1);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.added, 1);
    }

    #[test]
    fn analysis_with_extra_op_keys_still_executes() {
        let raw = r#"{"contentPlan": {"replace": [
            {"elemId": "a", "newText": "A"},
            {"elemId": "b", "newText": "B", "reason": "shorter"}
        ]}}"#;
        let analysis: AnalysisResult = serde_json::from_str(raw).expect("parse analysis");
        let mut doc = three_texts();
        let report = execute_plans(
            &mut doc,
            &analysis.content_plan,
            &analysis.layout_plan,
            &ExecuteOptions::default(),
        );

        assert_eq!(report.replaced, 2);
        assert!(report.errors.is_empty());
        assert_eq!(doc.element("a").and_then(|e| e.text()), Some("A"));
        assert_eq!(doc.element("b").and_then(|e| e.text()), Some("B"));
    }

    #[test]
    fn unknown_delete_ids_do_not_block_known_ones() {
        let mut doc = three_texts();
        let plan = ContentPlan {
            delete: vec![
                "b".to_string(),
                "stale".to_string(),
                "d".to_string(),
                "gone".to_string(),
            ],
            ..ContentPlan::default()
        };
        let report = execute_content_plan(&mut doc, &plan, &ExecuteOptions::default());

        assert_eq!(report.deleted, 2);
        assert!(doc.element("b").is_none());
        assert!(doc.element("d").is_none());
        let errors: Vec<_> = report.errors_for(Step::Delete).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, StepErrorKind::ElementNotFound);
        assert_eq!(errors[0].error, "elements not found: stale, gone");
    }

    #[test]
    fn creation_without_id_reports_original_position() {
        let mut owner = FlakyOwner {
            inner: nested_blocks(),
            fail_delete: false,
            no_id_on_create: true,
        };
        let plan = ContentPlan {
            add: vec![add(vec![0, 2], "body", "ghost")],
            ..ContentPlan::default()
        };
        let report = execute_content_plan(&mut owner, &plan, &ExecuteOptions::default());

        assert_eq!(report.added, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, StepErrorKind::Primitive);
        assert!(report.errors[0].error.contains("[0,2]"));
        assert!(!report.has_unresolved_add());
    }
}
