//! Reasoning service abstraction for analysis and validation calls.
//!
//! The [`ReasoningService`] trait decouples the fitting workflow from the
//! remote backend. [`CommandService`] bridges to an external command that
//! speaks JSON over stdin/stdout; tests use scripted services that return
//! predetermined envelopes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::serializer::{FlatTextElement, StructureNode};
use crate::core::types::{AnalysisResult, ExecutionReport, ValidationResult};
use crate::io::config::ServiceConfig;
use crate::io::process::run_command_with_timeout;

/// Correlation data for a tracked run, attached to every remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogContext {
    pub run_id: String,
    pub iteration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest<'a> {
    pub user_input: &'a str,
    pub elements: &'a [FlatTextElement],
    pub structure: &'a [StructureNode],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_context: Option<&'a LogContext>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest<'a> {
    pub user_input: &'a str,
    pub elements: &'a [FlatTextElement],
    pub structure: &'a [StructureNode],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_report: Option<&'a ExecutionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_context: Option<&'a LogContext>,
}

/// Response envelope shared by both endpoints. The payload arrives under
/// `analysis` or `validation`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(alias = "analysis", alias = "validation")]
    pub payload: Option<T>,
}

impl<T> ServiceEnvelope<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            message: None,
            payload: Some(payload),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            payload: None,
        }
    }

    /// Unwrap the payload; `success: false` or a missing payload is an error.
    pub fn into_payload(self, endpoint: &str) -> Result<T> {
        if !self.success {
            bail!(
                "{endpoint} failed: {}",
                self.message.as_deref().unwrap_or("no message")
            );
        }
        self.payload
            .ok_or_else(|| anyhow!("{endpoint} returned success without a payload"))
    }
}

/// Abstraction over reasoning backends.
pub trait ReasoningService {
    fn analyze(&self, request: &AnalyzeRequest<'_>) -> Result<ServiceEnvelope<AnalysisResult>>;

    fn validate(&self, request: &ValidateRequest<'_>)
    -> Result<ServiceEnvelope<ValidationResult>>;
}

/// Ask the service for a content/layout plan.
#[instrument(skip_all, fields(elements = request.elements.len()))]
pub fn request_analysis<S: ReasoningService>(
    service: &S,
    request: &AnalyzeRequest<'_>,
) -> Result<AnalysisResult> {
    let analysis = service.analyze(request)?.into_payload("analyze")?;
    debug!(
        replace = analysis.content_plan.replace.len(),
        delete = analysis.content_plan.delete.len(),
        add = analysis.content_plan.add.len(),
        list_adjust = analysis.content_plan.list_adjust.len(),
        "received analysis"
    );
    Ok(analysis)
}

/// Ask the service to judge the current document.
#[instrument(skip_all, fields(elements = request.elements.len()))]
pub fn request_validation<S: ReasoningService>(
    service: &S,
    request: &ValidateRequest<'_>,
) -> Result<ValidationResult> {
    let validation = service.validate(request)?.into_payload("validate")?;
    debug!(
        content_valid = validation.content_valid,
        layout_valid = validation.layout_valid,
        issues = validation.issues.len(),
        "received validation"
    );
    Ok(validation)
}

/// Service that spawns a bridge command per call.
///
/// The configured argv gets `analyze` or `validate` appended; the request is
/// written to stdin as JSON and the envelope is read from stdout.
#[derive(Debug, Clone)]
pub struct CommandService {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandService {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.command.clone(),
            Duration::from_secs(config.timeout_secs),
            config.output_limit_bytes,
        )
    }

    #[instrument(skip(self, request), fields(timeout_secs = self.timeout.as_secs()))]
    fn call<R: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &R,
    ) -> Result<ServiceEnvelope<T>> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("service command is empty"))?;
        info!(program = %program, "calling reasoning service");

        let payload = serde_json::to_vec(request).context("serialize service request")?;
        let mut cmd = Command::new(program);
        cmd.args(args).arg(endpoint);

        let output = run_command_with_timeout(
            cmd,
            Some(payload.as_slice()),
            self.timeout,
            self.output_limit_bytes,
        )
        .with_context(|| format!("run service command for {endpoint}"))?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "service call timed out");
            bail!("{endpoint} timed out after {:?}", self.timeout);
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "service call failed");
            bail!(
                "{endpoint} exited with status {:?}: {}",
                output.status.code(),
                output.stderr_text()
            );
        }
        if output.stdout_truncated > 0 {
            bail!(
                "{endpoint} response exceeded {} bytes",
                self.output_limit_bytes
            );
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parse {endpoint} response envelope"))
    }
}

impl ReasoningService for CommandService {
    fn analyze(&self, request: &AnalyzeRequest<'_>) -> Result<ServiceEnvelope<AnalysisResult>> {
        self.call("analyze", request)
    }

    fn validate(
        &self,
        request: &ValidateRequest<'_>,
    ) -> Result<ServiceEnvelope<ValidationResult>> {
        self.call("validate", request)
    }
}
