//! Fitter configuration stored under `.fitter/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::run_log::RunStatus;

/// Paths of the `.fitter/` state directory under a project root.
#[derive(Debug, Clone)]
pub struct FitterPaths {
    pub fitter_dir: PathBuf,
    pub config_path: PathBuf,
}

impl FitterPaths {
    pub fn new(root: &Path) -> Self {
        let fitter_dir = root.join(".fitter");
        Self {
            config_path: fitter_dir.join("config.toml"),
            fitter_dir,
        }
    }
}

/// Fitter configuration (TOML).
///
/// Missing fields default to the values the workflow was tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FitterConfig {
    /// Upper bound on analyze/execute/validate rounds per run.
    pub max_iterations: u32,

    /// Status reported to the run log when iterations run out without
    /// validation passing. The run itself never fails for this reason.
    pub exhaustion_status: RunStatus,

    /// `lineHeight` given to inserted text when the theme has none for its tag.
    pub default_line_height: f64,

    pub heuristics: HeuristicsConfig,

    pub service: ServiceConfig,

    pub run_log: RunLogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Rewrite `[0, k, ...]` insert positions to `[0, 0, k, ...]` before
    /// falling back to ancestors.
    pub missing_block_index: bool,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            missing_block_index: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bridge command; `analyze` or `validate` is appended per call.
    pub command: Vec<String>,

    /// Per-call wall-clock budget in seconds.
    pub timeout_secs: u64,

    /// Reject responses larger than this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: vec!["fitter-agent".to_string()],
            timeout_secs: 5 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunLogConfig {
    /// Directory receiving `<run_id>/finish.json`, relative to the project root.
    pub dir: PathBuf,
}

impl Default for RunLogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".fitter/runs"),
        }
    }
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            exhaustion_status: RunStatus::Success,
            default_line_height: 1.5,
            heuristics: HeuristicsConfig::default(),
            service: ServiceConfig::default(),
            run_log: RunLogConfig::default(),
        }
    }
}

impl FitterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if !self.default_line_height.is_finite() || self.default_line_height <= 0.0 {
            return Err(anyhow!("default_line_height must be a positive number"));
        }
        if self.service.timeout_secs == 0 {
            return Err(anyhow!("service.timeout_secs must be > 0"));
        }
        if self.service.output_limit_bytes == 0 {
            return Err(anyhow!("service.output_limit_bytes must be > 0"));
        }
        if self.service.command.is_empty() || self.service.command[0].trim().is_empty() {
            return Err(anyhow!("service.command must be a non-empty array"));
        }
        if self.run_log.dir.as_os_str().is_empty() {
            return Err(anyhow!("run_log.dir must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `FitterConfig::default()`.
pub fn load_config(path: &Path) -> Result<FitterConfig> {
    if !path.exists() {
        let cfg = FitterConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: FitterConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &FitterConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
