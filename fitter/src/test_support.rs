//! Test-only helpers for building documents and scripting remote services.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value};

use crate::core::types::{AnalysisResult, ValidationResult};
use crate::document::{Element, ElementKind, LayoutDocument, Row, RowStyle, TEXT_ATTR};
use crate::io::run_log::{FinishNotice, RunLogger};
use crate::io::service::{
    AnalyzeRequest, LogContext, ReasoningService, ServiceEnvelope, ValidateRequest,
};

/// Create an empty column row with tag `group`.
pub fn row(id: &str) -> Row {
    Row {
        id: id.to_string(),
        tag: "group".to_string(),
        style: RowStyle::default(),
        is_repeat_list: false,
        children_ids: Vec::new(),
        children: Vec::new(),
    }
}

pub fn row_with_children(id: &str, children: Vec<Row>) -> Row {
    Row {
        children,
        ..row(id)
    }
}

/// Place element ids into `row`, in order.
pub fn with_elements(mut row: Row, elem_ids: &[&str]) -> Row {
    row.children_ids = elem_ids.iter().map(|id| id.to_string()).collect();
    row
}

/// Builder for small documents; elements are only registered, rows decide
/// where they are placed.
#[derive(Debug, Default)]
pub struct DocBuilder {
    document: LayoutDocument,
}

impl DocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, id: &str, tag: &str, text: &str) -> Self {
        let mut attrs = Map::new();
        attrs.insert(TEXT_ATTR.to_string(), Value::String(text.to_string()));
        self.insert(id, ElementKind::Text, tag, attrs);
        self
    }

    pub fn image(mut self, id: &str) -> Self {
        let mut attrs = Map::new();
        attrs.insert("src".to_string(), Value::String(format!("{id}.png")));
        self.insert(id, ElementKind::Image, "image", attrs);
        self
    }

    /// Set one theme style property for `tag`.
    pub fn style(mut self, tag: &str, key: &str, value: Value) -> Self {
        self.document
            .theme
            .styles
            .entry(tag.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self
    }

    pub fn rows(mut self, rows: Vec<Row>) -> Self {
        self.document.rows = rows;
        self
    }

    pub fn build(self) -> LayoutDocument {
        self.document
    }

    fn insert(&mut self, id: &str, kind: ElementKind, tag: &str, attrs: Map<String, Value>) {
        self.document.elements.insert(
            id.to_string(),
            Element {
                id: id.to_string(),
                element_ref: kind,
                tag: tag.to_string(),
                attrs,
            },
        );
    }
}

/// One recorded call to a [`ScriptedService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCall {
    pub endpoint: &'static str,
    pub user_input: String,
    pub element_ids: Vec<String>,
    pub log_context: Option<LogContext>,
    pub had_execution_report: bool,
}

/// Service returning queued envelopes (or errors) in order.
///
/// An exhausted queue is an error, so a test fails loudly if the workflow
/// makes more calls than scripted.
#[derive(Default)]
pub struct ScriptedService {
    analyses: RefCell<VecDeque<Result<ServiceEnvelope<AnalysisResult>>>>,
    validations: RefCell<VecDeque<Result<ServiceEnvelope<ValidationResult>>>>,
    calls: RefCell<Vec<ServiceCall>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analysis(self, analysis: AnalysisResult) -> Self {
        self.analyses
            .borrow_mut()
            .push_back(Ok(ServiceEnvelope::ok(analysis)));
        self
    }

    pub fn analysis_failure(self, message: &str) -> Self {
        self.analyses
            .borrow_mut()
            .push_back(Ok(ServiceEnvelope::failure(message)));
        self
    }

    pub fn analysis_error(self, message: &str) -> Self {
        self.analyses
            .borrow_mut()
            .push_back(Err(anyhow!(message.to_string())));
        self
    }

    pub fn validation(self, validation: ValidationResult) -> Self {
        self.validations
            .borrow_mut()
            .push_back(Ok(ServiceEnvelope::ok(validation)));
        self
    }

    pub fn validation_failure(self, message: &str) -> Self {
        self.validations
            .borrow_mut()
            .push_back(Ok(ServiceEnvelope::failure(message)));
        self
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .count()
    }

    fn record(&self, call: ServiceCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl ReasoningService for ScriptedService {
    fn analyze(&self, request: &AnalyzeRequest<'_>) -> Result<ServiceEnvelope<AnalysisResult>> {
        self.record(ServiceCall {
            endpoint: "analyze",
            user_input: request.user_input.to_string(),
            element_ids: request.elements.iter().map(|e| e.elem_id.clone()).collect(),
            log_context: request.log_context.cloned(),
            had_execution_report: false,
        });
        match self.analyses.borrow_mut().pop_front() {
            Some(next) => next,
            None => bail!("no scripted analyze response left"),
        }
    }

    fn validate(
        &self,
        request: &ValidateRequest<'_>,
    ) -> Result<ServiceEnvelope<ValidationResult>> {
        self.record(ServiceCall {
            endpoint: "validate",
            user_input: request.user_input.to_string(),
            element_ids: request.elements.iter().map(|e| e.elem_id.clone()).collect(),
            log_context: request.log_context.cloned(),
            had_execution_report: request.execution_report.is_some(),
        });
        match self.validations.borrow_mut().pop_front() {
            Some(next) => next,
            None => bail!("no scripted validate response left"),
        }
    }
}

/// Run logger that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingRunLogger {
    notices: RefCell<Vec<FinishNotice>>,
    fail: bool,
}

impl RecordingRunLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger that records the notice and then reports a write failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn notices(&self) -> Vec<FinishNotice> {
        self.notices.borrow().clone()
    }
}

impl RunLogger for RecordingRunLogger {
    fn finish(&self, notice: &FinishNotice) -> Result<()> {
        self.notices.borrow_mut().push(notice.clone());
        if self.fail {
            bail!("run log unavailable");
        }
        Ok(())
    }
}
