//! Shared plan, report and validation types.
//!
//! These types define the contract with the reasoning service (plans and
//! validation results come in, execution reports go out) and between the
//! executor and the iteration controller.

use serde::{Deserialize, Serialize};

use crate::core::path::DepthPath;
use crate::document::Layout;

/// Resize a repeat list to `target_count` items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAdjust {
    pub row_depth: DepthPath,
    pub target_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOp {
    pub elem_id: String,
    pub new_text: String,
}

/// Insert a new text element into the row at `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOp {
    pub position: DepthPath,
    pub tag: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentPlan {
    pub list_adjust: Vec<ListAdjust>,
    pub replace: Vec<ReplaceOp>,
    pub delete: Vec<String>,
    pub add: Vec<AddOp>,
}

impl ContentPlan {
    pub fn is_empty(&self) -> bool {
        self.list_adjust.is_empty()
            && self.replace.is_empty()
            && self.delete.is_empty()
            && self.add.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexDirectionAdjust {
    pub row_depth: DepthPath,
    pub direction: Layout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapAdjust {
    pub row_depth: DepthPath,
    pub gap: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignItemsAdjust {
    pub row_depth: DepthPath,
    pub align_items: String,
}

/// Layout adjustments proposed by the service. Accepted but never applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutPlan {
    pub adjust_flex_direction: Vec<FlexDirectionAdjust>,
    pub adjust_gap: Vec<GapAdjust>,
    pub adjust_align_items: Vec<AlignItemsAdjust>,
}

impl LayoutPlan {
    pub fn len(&self) -> usize {
        self.adjust_flex_direction.len() + self.adjust_gap.len() + self.adjust_align_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Payload of a successful `analyze` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    pub content_plan: ContentPlan,
    pub layout_plan: LayoutPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Executor phase an error was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    ListAdjust,
    Replace,
    Delete,
    Add,
}

/// Machine-readable cause of a recorded step error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    /// The element id is not in the document.
    ElementNotFound,
    /// The element exists but is not a text element.
    NotText,
    /// No row could be resolved for an insert position.
    UnresolvedPosition,
    /// A document primitive failed or returned nothing.
    Primitive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub step: Step,
    pub kind: StepErrorKind,
    pub error: String,
}

/// Per-operation ledger for one content-plan execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub replaced: usize,
    pub deleted: usize,
    pub added: usize,
    pub layout_adjusted: usize,
    pub list_adjusted: usize,
    pub errors: Vec<StepError>,
}

impl ExecutionReport {
    pub(crate) fn record(&mut self, step: Step, kind: StepErrorKind, error: String) {
        self.errors.push(StepError { step, kind, error });
    }

    /// True if any insert failed because its position did not resolve.
    pub fn has_unresolved_add(&self) -> bool {
        self.errors
            .iter()
            .any(|err| err.step == Step::Add && err.kind == StepErrorKind::UnresolvedPosition)
    }

    pub fn errors_for(&self, step: Step) -> impl Iterator<Item = &StepError> {
        self.errors.iter().filter(move |err| err.step == step)
    }
}

/// Content edits embedded in a validator issue.
///
/// Unlike analysis plans, fix payloads reject unknown keys at every level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StrictContentFix")]
pub struct ContentFix {
    pub replace: Vec<ReplaceOp>,
    pub delete: Vec<String>,
    pub add: Vec<AddOp>,
}

/// Layout edits embedded in a validator issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StrictLayoutFix")]
pub struct LayoutFix {
    pub adjust_flex_direction: Vec<FlexDirectionAdjust>,
    pub adjust_gap: Vec<GapAdjust>,
    pub adjust_align_items: Vec<AlignItemsAdjust>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
struct StrictContentFix {
    replace: Vec<StrictReplace>,
    delete: Vec<String>,
    add: Vec<StrictAdd>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StrictReplace {
    elem_id: String,
    new_text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StrictAdd {
    position: DepthPath,
    tag: String,
    text: String,
    #[serde(default)]
    order: Option<usize>,
}

impl From<StrictContentFix> for ContentFix {
    fn from(fix: StrictContentFix) -> Self {
        Self {
            replace: fix
                .replace
                .into_iter()
                .map(|op| ReplaceOp {
                    elem_id: op.elem_id,
                    new_text: op.new_text,
                })
                .collect(),
            delete: fix.delete,
            add: fix
                .add
                .into_iter()
                .map(|op| AddOp {
                    position: op.position,
                    tag: op.tag,
                    text: op.text,
                    order: op.order,
                })
                .collect(),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
struct StrictLayoutFix {
    adjust_flex_direction: Vec<StrictFlexDirection>,
    adjust_gap: Vec<StrictGap>,
    adjust_align_items: Vec<StrictAlignItems>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StrictFlexDirection {
    row_depth: DepthPath,
    direction: Layout,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StrictGap {
    row_depth: DepthPath,
    gap: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StrictAlignItems {
    row_depth: DepthPath,
    align_items: String,
}

impl From<StrictLayoutFix> for LayoutFix {
    fn from(fix: StrictLayoutFix) -> Self {
        Self {
            adjust_flex_direction: fix
                .adjust_flex_direction
                .into_iter()
                .map(|op| FlexDirectionAdjust {
                    row_depth: op.row_depth,
                    direction: op.direction,
                })
                .collect(),
            adjust_gap: fix
                .adjust_gap
                .into_iter()
                .map(|op| GapAdjust {
                    row_depth: op.row_depth,
                    gap: op.gap,
                })
                .collect(),
            adjust_align_items: fix
                .adjust_align_items
                .into_iter()
                .map(|op| AlignItemsAdjust {
                    row_depth: op.row_depth,
                    align_items: op.align_items,
                })
                .collect(),
        }
    }
}

/// A validator finding, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Issue {
    Content {
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fix: Option<ContentFix>,
    },
    Layout {
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fix: Option<LayoutFix>,
    },
}

impl Issue {
    pub fn description(&self) -> &str {
        match self {
            Issue::Content { description, .. } | Issue::Layout { description, .. } => description,
        }
    }
}

/// Payload of a successful `validate` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub content_valid: bool,
    pub layout_valid: bool,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.content_valid && self.layout_valid
    }
}
