//! Insert-position resolution with fallbacks for stale addresses.
//!
//! Positions proposed by the reasoning service are approximations of the
//! current tree. Resolution tries, in order:
//! 1. the position as given;
//! 2. each configured [`PositionHeuristic`] rewrite;
//! 3. every strict, non-empty prefix, longest first (positions of length >= 2).

use crate::core::path::{DepthPath, resolve_row};
use crate::document::Row;

/// A rewrite rule for a known drift pattern in proposed positions.
pub trait PositionHeuristic {
    fn name(&self) -> &'static str;

    /// Return a corrected position, or `None` if the rule does not apply.
    fn rewrite(&self, position: &DepthPath) -> Option<DepthPath>;
}

/// Restores an omitted block index: `[0, k, ...]` with `k != 0` becomes
/// `[0, 0, k, ...]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingBlockIndex;

impl PositionHeuristic for MissingBlockIndex {
    fn name(&self) -> &'static str {
        "missing_block_index"
    }

    fn rewrite(&self, position: &DepthPath) -> Option<DepthPath> {
        match position.as_slice() {
            [0, second, rest @ ..] if *second != 0 => {
                let mut indices = Vec::with_capacity(position.len() + 1);
                indices.extend([0, 0, *second]);
                indices.extend_from_slice(rest);
                Some(DepthPath::new(indices))
            }
            _ => None,
        }
    }
}

/// How a position was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Exact(DepthPath),
    Heuristic {
        name: &'static str,
        path: DepthPath,
    },
    Ancestor(DepthPath),
}

impl Resolution {
    pub fn path(&self) -> &DepthPath {
        match self {
            Resolution::Exact(path) | Resolution::Ancestor(path) => path,
            Resolution::Heuristic { path, .. } => path,
        }
    }
}

pub struct PositionResolver {
    heuristics: Vec<Box<dyn PositionHeuristic>>,
}

impl Default for PositionResolver {
    fn default() -> Self {
        Self::new(vec![Box::new(MissingBlockIndex)])
    }
}

impl PositionResolver {
    pub fn new(heuristics: Vec<Box<dyn PositionHeuristic>>) -> Self {
        Self { heuristics }
    }

    /// Resolver with only exact and ancestor tiers.
    pub fn without_heuristics() -> Self {
        Self::new(Vec::new())
    }

    pub fn resolve(&self, rows: &[Row], position: &DepthPath) -> Option<Resolution> {
        if resolve_row(rows, position).is_some() {
            return Some(Resolution::Exact(position.clone()));
        }

        for heuristic in &self.heuristics {
            if let Some(path) = heuristic.rewrite(position)
                && resolve_row(rows, &path).is_some()
            {
                return Some(Resolution::Heuristic {
                    name: heuristic.name(),
                    path,
                });
            }
        }

        if position.len() < 2 {
            return None;
        }
        position
            .ancestors()
            .find(|prefix| resolve_row(rows, prefix).is_some())
            .map(Resolution::Ancestor)
    }
}
