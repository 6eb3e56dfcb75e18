//! Depth-path addressing for rows in the layout forest.
//!
//! A depth path is an ordered sequence of indices: the first selects a
//! top-level row, each subsequent index selects a child row of the previous
//! one. Paths are positional, so structural edits earlier in a run may
//! invalidate them.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::document::Row;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepthPath(Vec<usize>);

impl DepthPath {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    /// Path of the top-level row at `index`.
    pub fn top(index: usize) -> Self {
        Self(vec![index])
    }

    /// Path of the child at `index` below this row.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Strict, non-empty prefixes from longest to shortest.
    pub fn ancestors(&self) -> impl Iterator<Item = DepthPath> + '_ {
        (1..self.0.len())
            .rev()
            .map(|len| DepthPath(self.0[..len].to_vec()))
    }
}

impl From<Vec<usize>> for DepthPath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for DepthPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(","))
    }
}

/// Parses `[0,1,2]`, `0,1,2` or `0.1.2`.
impl FromStr for DepthPath {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
        if trimmed.trim().is_empty() {
            return Err(anyhow!("empty depth path"));
        }
        let indices = trimmed
            .split([',', '.'])
            .map(|part| {
                part.trim()
                    .parse::<usize>()
                    .with_context(|| format!("invalid depth path segment '{part}' in '{raw}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(indices))
    }
}

/// Resolve `path` against `rows`. The empty path resolves to nothing.
pub fn resolve_row<'a>(rows: &'a [Row], path: &DepthPath) -> Option<&'a Row> {
    let (first, rest) = path.as_slice().split_first()?;
    let mut row = rows.get(*first)?;
    for index in rest {
        row = row.children.get(*index)?;
    }
    Some(row)
}

pub fn resolve_row_mut<'a>(rows: &'a mut [Row], path: &DepthPath) -> Option<&'a mut Row> {
    let (first, rest) = path.as_slice().split_first()?;
    let mut row = rows.get_mut(*first)?;
    for index in rest {
        row = row.children.get_mut(*index)?;
    }
    Some(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{row, row_with_children};

    #[test]
    fn resolves_nested_rows_by_index() {
        let rows = vec![row_with_children(
            "block",
            vec![row("a"), row_with_children("b", vec![row("b0")])],
        )];

        assert_eq!(
            resolve_row(&rows, &DepthPath::new(vec![0, 1, 0])).map(|r| r.id.as_str()),
            Some("b0")
        );
        assert!(resolve_row(&rows, &DepthPath::new(vec![0, 2])).is_none());
        assert!(resolve_row(&rows, &DepthPath::default()).is_none());
    }

    #[test]
    fn ancestors_run_longest_first_and_exclude_empty() {
        let path = DepthPath::new(vec![0, 0, 5]);
        let got: Vec<String> = path.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(got, vec!["[0,0]".to_string(), "[0]".to_string()]);
        assert_eq!(DepthPath::top(3).ancestors().count(), 0);
    }

    #[test]
    fn parses_bracketed_and_dotted_forms() {
        assert_eq!(
            "[0, 1,2]".parse::<DepthPath>().expect("parse"),
            DepthPath::new(vec![0, 1, 2])
        );
        assert_eq!(
            "3.4".parse::<DepthPath>().expect("parse"),
            DepthPath::new(vec![3, 4])
        );
        assert!("[]".parse::<DepthPath>().is_err());
        assert!("0,x".parse::<DepthPath>().is_err());
    }
}
