//! Run-finish notifications for tracked fitting runs.
//!
//! A run is tracked when it carries a run id. At the end of a tracked run
//! the workflow hands a [`FinishNotice`] to a [`RunLogger`]. Failures to log
//! never change the outcome of the run itself.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::serializer::FlatTextElement;

/// Final status recorded for a tracked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

/// Document state captured when a run finishes: the flat text list plus a
/// rendered structure summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSnapshot {
    pub elements: Vec<FlatTextElement>,
    pub structure: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishNotice {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_snapshot: Option<FinalSnapshot>,
}

pub trait RunLogger {
    fn finish(&self, notice: &FinishNotice) -> Result<()>;
}

/// Logger for untracked setups; accepts and drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRunLogger;

impl RunLogger for NullRunLogger {
    fn finish(&self, _notice: &FinishNotice) -> Result<()> {
        Ok(())
    }
}

/// Record written to `<dir>/<run_id>/finish.json`.
#[derive(Debug, Serialize)]
struct FinishRecord<'a> {
    #[serde(flatten)]
    notice: &'a FinishNotice,
    finished_at: String,
}

/// Writes one `finish.json` per run under `dir`.
#[derive(Debug, Clone)]
pub struct FileRunLogger {
    dir: PathBuf,
}

impl FileRunLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn finish_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(run_id).join("finish.json")
    }
}

impl RunLogger for FileRunLogger {
    fn finish(&self, notice: &FinishNotice) -> Result<()> {
        let path = self.finish_path(&notice.run_id);
        let parent = path
            .parent()
            .with_context(|| format!("run log path missing parent {}", path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("create run log dir {}", parent.display()))?;
        let record = FinishRecord {
            notice,
            finished_at: Utc::now().to_rfc3339(),
        };
        write_json(&path, &record)?;
        debug!(path = %path.display(), status = notice.status.as_str(), "wrote run finish log");
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

/// New run id: `run-<UTC timestamp>-<6 lowercase alphanumerics>`.
pub fn generate_run_id() -> String {
    format!("run-{}-{}", generate_timestamp(), generate_short_id())
}

fn generate_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}
