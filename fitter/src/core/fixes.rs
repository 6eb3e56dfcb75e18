//! Build supplementary plans from validator issue fixes.

use crate::core::types::{ContentPlan, Issue, LayoutPlan};

/// Content and layout plans assembled from issue fixes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixPlans {
    pub content: ContentPlan,
    pub layout: LayoutPlan,
}

impl FixPlans {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.layout.is_empty()
    }
}

/// Concatenate every issue's fix into plans, grouped by issue type and kept
/// in issue order. Issues without a fix contribute nothing.
pub fn plans_from_issues(issues: &[Issue]) -> FixPlans {
    let mut plans = FixPlans::default();
    for issue in issues {
        match issue {
            Issue::Content { fix: Some(fix), .. } => {
                plans.content.replace.extend(fix.replace.iter().cloned());
                plans.content.delete.extend(fix.delete.iter().cloned());
                plans.content.add.extend(fix.add.iter().cloned());
            }
            Issue::Layout { fix: Some(fix), .. } => {
                plans
                    .layout
                    .adjust_flex_direction
                    .extend(fix.adjust_flex_direction.iter().cloned());
                plans.layout.adjust_gap.extend(fix.adjust_gap.iter().cloned());
                plans
                    .layout
                    .adjust_align_items
                    .extend(fix.adjust_align_items.iter().cloned());
            }
            Issue::Content { fix: None, .. } | Issue::Layout { fix: None, .. } => {}
        }
    }
    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::path::DepthPath;
    use crate::core::types::{AddOp, ContentFix, GapAdjust, LayoutFix, ReplaceOp};

    #[test]
    fn concatenates_fixes_in_issue_order() {
        let issues = vec![
            Issue::Content {
                description: "title too long".to_string(),
                fix: Some(ContentFix {
                    replace: vec![ReplaceOp {
                        elem_id: "t1".to_string(),
                        new_text: "Short".to_string(),
                    }],
                    ..ContentFix::default()
                }),
            },
            Issue::Layout {
                description: "tight".to_string(),
                fix: Some(LayoutFix {
                    adjust_gap: vec![GapAdjust {
                        row_depth: DepthPath::top(0),
                        gap: 8.0,
                    }],
                    ..LayoutFix::default()
                }),
            },
            Issue::Content {
                description: "missing footer".to_string(),
                fix: Some(ContentFix {
                    delete: vec!["old".to_string()],
                    add: vec![AddOp {
                        position: DepthPath::top(1),
                        tag: "footer".to_string(),
                        text: "Thanks".to_string(),
                        order: None,
                    }],
                    ..ContentFix::default()
                }),
            },
            Issue::Content {
                description: "no fix offered".to_string(),
                fix: None,
            },
        ];

        let plans = plans_from_issues(&issues);
        assert_eq!(plans.content.replace.len(), 1);
        assert_eq!(plans.content.delete, vec!["old".to_string()]);
        assert_eq!(plans.content.add.len(), 1);
        assert!(plans.content.list_adjust.is_empty());
        assert_eq!(plans.layout.adjust_gap.len(), 1);
        assert!(!plans.is_empty());
    }

    #[test]
    fn issues_without_fixes_yield_empty_plans() {
        let issues = vec![Issue::Layout {
            description: "looks off".to_string(),
            fix: None,
        }];
        assert!(plans_from_issues(&issues).is_empty());
    }
}
