//! Analyze → execute → validate iteration controller.
//!
//! Each iteration re-serializes the document, asks the reasoning service
//! for a plan, executes it and asks the service to validate the result.
//! The run stops when validation passes or the iteration budget is spent.
//! Two special cases alter the basic loop:
//! - an insert whose position could not be resolved skips validation and
//!   re-analyzes straight away, at most once per run;
//! - validator issues carrying fixes are applied within the same iteration
//!   when another iteration remains to judge them.
//!
//! Service errors are retried while iterations remain. Running out of
//! iterations is not an error.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::fixes::plans_from_issues;
use crate::core::serializer::DocumentView;
use crate::core::types::{ExecutionReport, ValidationResult};
use crate::execute::{ExecuteOptions, execute_plans};
use crate::io::config::FitterConfig;
use crate::io::document_owner::DocumentOwner;
use crate::io::run_log::{FinishNotice, RunLogger, RunStatus};
use crate::io::service::{
    AnalyzeRequest, LogContext, ReasoningService, ValidateRequest, request_analysis,
    request_validation,
};
use crate::io::snapshot::build_final_snapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    pub max_iterations: u32,
    /// Status reported when iterations run out without convergence.
    pub exhaustion_status: RunStatus,
    pub execute: ExecuteOptions,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            exhaustion_status: RunStatus::Success,
            execute: ExecuteOptions::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn from_config(config: &FitterConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            exhaustion_status: config.exhaustion_status,
            execute: ExecuteOptions::from_config(config),
        }
    }
}

/// Caller input for one fitting run. A run is tracked when `run_id` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FitRequest {
    pub user_input: String,
    pub template_id: Option<String>,
    pub template_title: Option<String>,
    pub run_id: Option<String>,
}

impl FitRequest {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Self::default()
        }
    }
}

/// Controller states, reported as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitPhase {
    Analyzing,
    Executing,
    Validating,
    Converged,
    Retrying,
    ApplyingFix,
    Failed,
}

impl FitPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            FitPhase::Analyzing => "analyzing",
            FitPhase::Executing => "executing",
            FitPhase::Validating => "validating",
            FitPhase::Converged => "converged",
            FitPhase::Retrying => "retrying",
            FitPhase::ApplyingFix => "applying_fix",
            FitPhase::Failed => "failed",
        }
    }
}

/// Reason why `run_fit` stopped without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FitStop {
    /// Validation passed in this iteration.
    Converged { iteration: u32 },
    /// Every iteration ran without validation passing.
    Exhausted { iterations: u32 },
}

/// Summary of a fitting run.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub run_id: Option<String>,
    pub stop: FitStop,
    pub iterations: u32,
    pub structural_retry_taken: bool,
    pub last_report: Option<ExecutionReport>,
    pub last_validation: Option<ValidationResult>,
}

impl FitOutcome {
    pub fn converged(&self) -> bool {
        matches!(self.stop, FitStop::Converged { .. })
    }
}

struct RunState {
    iteration: u32,
    max_iterations: u32,
    already_retried_for_add_errors: bool,
    run_id: Option<String>,
    last_report: Option<ExecutionReport>,
    last_validation: Option<ValidationResult>,
}

impl RunState {
    fn iterations_remain(&self) -> bool {
        self.iteration < self.max_iterations
    }

    fn log_context(&self, request: &FitRequest) -> Option<LogContext> {
        self.run_id.as_ref().map(|run_id| LogContext {
            run_id: run_id.clone(),
            iteration: self.iteration,
            template_id: request.template_id.clone(),
            template_title: request.template_title.clone(),
        })
    }

    fn into_outcome(self, stop: FitStop) -> FitOutcome {
        FitOutcome {
            run_id: self.run_id,
            stop,
            iterations: self.iteration,
            structural_retry_taken: self.already_retried_for_add_errors,
            last_report: self.last_report,
            last_validation: self.last_validation,
        }
    }
}

enum IterationEnd {
    Converged,
    Retry,
    Continue,
}

/// Run the fitting loop against `document` until validation passes or the
/// iteration budget is spent.
///
/// Returns an error only when the final permitted iteration fails; the
/// document keeps every edit applied up to that point.
#[instrument(skip_all, fields(
    run_id = request.run_id.as_deref().unwrap_or("-"),
    max_iterations = config.max_iterations,
))]
pub fn run_fit<D, S, L, F>(
    document: &mut D,
    service: &S,
    logger: &L,
    request: &FitRequest,
    config: &WorkflowConfig,
    mut on_phase: F,
) -> Result<FitOutcome>
where
    D: DocumentOwner,
    S: ReasoningService,
    L: RunLogger,
    F: FnMut(u32, FitPhase),
{
    let mut state = RunState {
        iteration: 0,
        max_iterations: config.max_iterations,
        already_retried_for_add_errors: false,
        run_id: request.run_id.clone(),
        last_report: None,
        last_validation: None,
    };

    while state.iteration < state.max_iterations {
        state.iteration += 1;
        match run_iteration(document, service, request, config, &mut state, &mut on_phase) {
            Ok(IterationEnd::Converged) => {
                info!(iteration = state.iteration, "fit converged");
                on_phase(state.iteration, FitPhase::Converged);
                notify_finish(logger, &state, document, RunStatus::Success, None);
                let stop = FitStop::Converged {
                    iteration: state.iteration,
                };
                return Ok(state.into_outcome(stop));
            }
            Ok(IterationEnd::Retry | IterationEnd::Continue) => {}
            Err(err) if state.iterations_remain() => {
                warn!(
                    iteration = state.iteration,
                    err = %format!("{err:#}"),
                    "iteration failed, retrying"
                );
            }
            Err(err) => {
                warn!(
                    iteration = state.iteration,
                    err = %format!("{err:#}"),
                    "final iteration failed"
                );
                on_phase(state.iteration, FitPhase::Failed);
                notify_finish(
                    logger,
                    &state,
                    document,
                    RunStatus::Failed,
                    Some(format!("{err:#}")),
                );
                return Err(err);
            }
        }
    }

    info!(iterations = state.iteration, "fit exhausted iterations");
    notify_finish(logger, &state, document, config.exhaustion_status, None);
    let stop = FitStop::Exhausted {
        iterations: state.iteration,
    };
    Ok(state.into_outcome(stop))
}

fn run_iteration<D, S, F>(
    document: &mut D,
    service: &S,
    request: &FitRequest,
    config: &WorkflowConfig,
    state: &mut RunState,
    on_phase: &mut F,
) -> Result<IterationEnd>
where
    D: DocumentOwner,
    S: ReasoningService,
    F: FnMut(u32, FitPhase),
{
    let iteration = state.iteration;
    let log_context = state.log_context(request);

    on_phase(iteration, FitPhase::Analyzing);
    let view = DocumentView::capture(document.document());
    let analysis = request_analysis(
        service,
        &AnalyzeRequest {
            user_input: &request.user_input,
            elements: &view.elements,
            structure: &view.structure,
            log_context: log_context.as_ref(),
        },
    )?;

    on_phase(iteration, FitPhase::Executing);
    let report = execute_plans(
        document,
        &analysis.content_plan,
        &analysis.layout_plan,
        &config.execute,
    );
    let unresolved_add = report.has_unresolved_add();
    state.last_report = Some(report);

    if unresolved_add && !state.already_retried_for_add_errors && state.iterations_remain() {
        state.already_retried_for_add_errors = true;
        debug!(iteration, "unresolved insert position, re-analyzing");
        on_phase(iteration, FitPhase::Retrying);
        return Ok(IterationEnd::Retry);
    }

    on_phase(iteration, FitPhase::Validating);
    let view = DocumentView::capture(document.document());
    let validation = request_validation(
        service,
        &ValidateRequest {
            user_input: &request.user_input,
            elements: &view.elements,
            structure: &view.structure,
            execution_report: state.last_report.as_ref(),
            log_context: log_context.as_ref(),
        },
    )?;

    let converged = validation.is_valid();
    let fixes = (!converged && state.iterations_remain() && !validation.issues.is_empty())
        .then(|| plans_from_issues(&validation.issues));
    state.last_validation = Some(validation);
    if converged {
        return Ok(IterationEnd::Converged);
    }

    if let Some(fixes) = fixes {
        on_phase(iteration, FitPhase::ApplyingFix);
        let fix_report = execute_plans(document, &fixes.content, &fixes.layout, &config.execute);
        debug!(
            iteration,
            replaced = fix_report.replaced,
            deleted = fix_report.deleted,
            added = fix_report.added,
            errors = fix_report.errors.len(),
            "applied validator fixes"
        );
    }
    Ok(IterationEnd::Continue)
}

/// Send the finish notice for tracked runs. Logging failures are reported
/// and otherwise ignored.
fn notify_finish<D: DocumentOwner, L: RunLogger>(
    logger: &L,
    state: &RunState,
    document: &D,
    status: RunStatus,
    error_message: Option<String>,
) {
    let Some(run_id) = state.run_id.clone() else {
        return;
    };
    // Failed runs carry the error instead of a snapshot.
    let final_snapshot = if error_message.is_none() {
        match build_final_snapshot(document.document()) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(err = %format!("{err:#}"), "failed to build final snapshot");
                None
            }
        }
    } else {
        None
    };
    let notice = FinishNotice {
        run_id,
        status,
        error_message,
        final_snapshot,
    };
    if let Err(err) = logger.finish(&notice) {
        warn!(err = %format!("{err:#}"), "failed to record run finish");
    }
}
