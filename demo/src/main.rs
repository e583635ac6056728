//! REGULA ANVISA Reference Runtime Demo CLI
//!
//! Runs the reference scenarios, or one ad-hoc analysis against the offline
//! corpus, and prints each finalized output as JSON.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- device-registration
//!   cargo run -p demo -- analyze --query "Class II pump registration with ANVISA" --priority high
//!   cargo run -p demo -- --json-logs analyze --query "..." --config regula.toml

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use regula_config::OrchestratorConfig;
use regula_contracts::{
    error::{RegulaError, RegulaResult},
    request::{AnalysisRequest, Priority},
};
use regula_ref_anvisa::{
    scenarios::{self, compliance_outage, contradiction, device_registration, revision_budget, ScenarioReport},
    Runtime,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// REGULA: bounded multi-agent regulatory analysis.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "REGULA ANVISA reference runtime demo",
    long_about = "Runs REGULA reference scenarios showing fan-out, retries, quality-control\n\
                  revisions, degraded answers, and the hash-chained run ledger."
)]
struct Cli {
    /// Emit logs as JSON lines instead of the compact format.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all four reference scenarios in sequence.
    RunAll,
    /// Scenario 1: device registration, accepted after retries.
    DeviceRegistration,
    /// Scenario 2: compliance backend outage, degraded.
    ComplianceOutage,
    /// Scenario 3: contradictory verdicts reconciled through a revision.
    Contradiction,
    /// Scenario 4: out-of-corpus question exhausting its revision budget.
    RevisionBudget,
    /// Analyze one question against the offline corpus.
    Analyze {
        #[arg(long)]
        query: String,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
        /// Free text, or a JSON object.
        #[arg(long)]
        context: Option<String>,
        /// Orchestrator configuration TOML file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PriorityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
            PriorityArg::Critical => Priority::Critical,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let result = match cli.command {
        Command::RunAll => scenarios::run_all().await.and_then(|reports| print_reports(&reports)),
        Command::DeviceRegistration => print_scenario(device_registration::run_scenario().await),
        Command::ComplianceOutage => print_scenario(compliance_outage::run_scenario().await),
        Command::Contradiction => print_scenario(contradiction::run_scenario().await),
        Command::RevisionBudget => print_scenario(revision_budget::run_scenario().await),
        Command::Analyze {
            query,
            priority,
            context,
            config,
        } => analyze(query, priority.into(), context, config).await,
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

/// Structured logging to stderr. Set RUST_LOG=debug for verbose output.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn analyze(
    query: String,
    priority: Priority,
    context: Option<String>,
    config: Option<PathBuf>,
) -> RegulaResult<()> {
    let config = match config {
        Some(path) => OrchestratorConfig::from_file(&path)?,
        None => OrchestratorConfig::default(),
    };
    let mut request = AnalysisRequest::new(query, priority);
    if let Some(context) = context {
        // Anything that is not valid JSON is passed through as text.
        let value = serde_json::from_str(&context).unwrap_or(serde_json::Value::String(context));
        request = request.with_context(value);
    }

    let runtime = Runtime::offline(config)?;
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling run");
            ctrl_c.cancel();
        }
    });

    let output = runtime.orchestrator.run_with_cancellation(request, cancel).await?;
    print_json(&output)
}

fn print_scenario(report: RegulaResult<ScenarioReport>) -> RegulaResult<()> {
    print_reports(&[report?])
}

fn print_reports(reports: &[ScenarioReport]) -> RegulaResult<()> {
    for report in reports {
        eprintln!(
            "=== {} === status: {} | confidence: {:.2} | revisions: {} | ledger: {}",
            report.name,
            report.output.status,
            report.output.confidence_score,
            report.output.revision_count,
            if report.ledger_verified { "VERIFIED" } else { "FAILED" },
        );
        print_json(&report.output)?;
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> RegulaResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| RegulaError::Observability {
        reason: format!("failed to serialize output: {e}"),
    })?;
    println!("{text}");
    Ok(())
}
