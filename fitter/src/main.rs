//! Agentic content fitter.
//!
//! Loads a layout document (JSON), serializes it for a reasoning service and
//! drives the analyze/execute/validate loop until the document fits the
//! user's intent. State lives under `.fitter/` in the working directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use fitter::core::serializer::DocumentView;
use fitter::core::types::AnalysisResult;
use fitter::execute::{ExecuteOptions, execute_plans};
use fitter::exit_codes;
use fitter::io::config::{FitterConfig, FitterPaths, load_config, write_config};
use fitter::io::document_store::{load_document, write_document};
use fitter::io::run_log::{FileRunLogger, generate_run_id};
use fitter::io::service::CommandService;
use fitter::io::snapshot::render_structure;
use fitter::logging;
use fitter::workflow::{FitOutcome, FitRequest, FitStop, WorkflowConfig, run_fit};

#[derive(Parser)]
#[command(
    name = "fitter",
    version,
    about = "Fit layout document text to an intent with an analyze/validate loop"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.fitter/config.toml` with defaults if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Check a document against the schema and invariants.
    Validate {
        #[arg(long)]
        document: PathBuf,
    },
    /// Print the flat element list and structure tree sent to the service.
    Serialize {
        #[arg(long)]
        document: PathBuf,
        /// Print the indented structure outline instead of JSON.
        #[arg(long)]
        summary: bool,
    },
    /// Execute an analysis plan (`{contentPlan, layoutPlan}`) against a document.
    Apply {
        #[arg(long)]
        document: PathBuf,
        #[arg(long)]
        plan: PathBuf,
        /// Write the result here instead of overwriting the document.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the fitting loop against the configured reasoning service.
    Fit {
        #[arg(long)]
        document: PathBuf,
        /// Write the result here instead of overwriting the document.
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        template_id: Option<String>,
        #[arg(long)]
        template_title: Option<String>,
        /// Skip run ids and the finish log.
        #[arg(long)]
        untracked: bool,
        /// What the user wants the document to say.
        intent: String,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(force),
        Command::Validate { document } => cmd_validate(&document),
        Command::Serialize { document, summary } => cmd_serialize(&document, summary),
        Command::Apply {
            document,
            plan,
            output,
        } => cmd_apply(&document, &plan, output.as_deref()),
        Command::Fit {
            document,
            output,
            template_id,
            template_title,
            untracked,
            intent,
        } => {
            let request = FitRequest {
                user_input: intent,
                template_id,
                template_title,
                run_id: (!untracked).then(generate_run_id),
            };
            cmd_fit(&document, output.as_deref(), request)
        }
    }
}

fn cmd_init(force: bool) -> Result<i32> {
    let paths = FitterPaths::new(Path::new("."));
    if force || !paths.config_path.exists() {
        write_config(&paths.config_path, &FitterConfig::default())?;
    }
    Ok(exit_codes::OK)
}

fn cmd_validate(document: &Path) -> Result<i32> {
    load_document(document)?;
    println!("ok");
    Ok(exit_codes::OK)
}

fn cmd_serialize(document: &Path, summary: bool) -> Result<i32> {
    let doc = load_document(document)?;
    let view = DocumentView::capture(&doc);
    if summary {
        print!("{}", render_structure(&view.structure)?);
    } else {
        println!("{}", to_json(&view)?);
    }
    Ok(exit_codes::OK)
}

fn cmd_apply(document: &Path, plan: &Path, output: Option<&Path>) -> Result<i32> {
    let config = load_config(&FitterPaths::new(Path::new(".")).config_path)?;
    let mut doc = load_document(document)?;
    let raw = fs::read_to_string(plan).with_context(|| format!("read plan {}", plan.display()))?;
    let analysis: AnalysisResult =
        serde_json::from_str(&raw).with_context(|| format!("parse plan {}", plan.display()))?;

    let report = execute_plans(
        &mut doc,
        &analysis.content_plan,
        &analysis.layout_plan,
        &ExecuteOptions::from_config(&config),
    );
    write_document(output.unwrap_or(document), &doc)?;
    println!("{}", to_json(&report)?);
    Ok(exit_codes::OK)
}

#[derive(Serialize)]
struct FitSummary<'a> {
    run_id: Option<&'a str>,
    status: &'static str,
    iterations: u32,
    structural_retry_taken: bool,
}

impl<'a> FitSummary<'a> {
    fn from_outcome(outcome: &'a FitOutcome) -> Self {
        let (status, iterations) = match outcome.stop {
            FitStop::Converged { iteration } => ("converged", iteration),
            FitStop::Exhausted { iterations } => ("exhausted", iterations),
        };
        Self {
            run_id: outcome.run_id.as_deref(),
            status,
            iterations,
            structural_retry_taken: outcome.structural_retry_taken,
        }
    }
}

fn cmd_fit(document: &Path, output: Option<&Path>, request: FitRequest) -> Result<i32> {
    let root = Path::new(".");
    let config = load_config(&FitterPaths::new(root).config_path)?;
    let mut doc = load_document(document)?;
    let service = CommandService::from_config(&config.service);
    let logger = FileRunLogger::new(root.join(&config.run_log.dir));

    let result = run_fit(
        &mut doc,
        &service,
        &logger,
        &request,
        &WorkflowConfig::from_config(&config),
        |iteration, phase| debug!(iteration, phase = phase.as_str(), "fit phase"),
    );

    // Edits applied before a failure are kept.
    write_document(output.unwrap_or(document), &doc)?;
    match result {
        Ok(outcome) => {
            println!("{}", to_json(&FitSummary::from_outcome(&outcome))?);
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("{:#}", err);
            Ok(exit_codes::FIT_FAILED)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize json")
}
