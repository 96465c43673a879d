//! irops-sim - run a simulated disruption scenario end to end
//!
//! Plans the stage sequence for the chosen scenario, executes it with the
//! simulated stage executors and a live communications broker, and prints
//! the resulting run summary.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use irops_comms::CommsBroker;
use irops_router::format_sequence;
use irops_runtime::simulation::{simulated_registry, Scenario};
use irops_runtime::{RuntimeConfig, StageOutcome, WorkflowDriver};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// IROPS scenario simulator CLI
#[derive(Parser)]
#[command(name = "irops-sim")]
#[command(about = "Run a simulated airline disruption through the IROPS coordination core")]
#[command(long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "IROPS_CONFIG")]
    config: Option<String>,

    /// Scenario: weather-crew, weather, crew, cancellation, clear
    #[arg(short, long, default_value = "cancellation")]
    scenario: Scenario,

    /// Impacted passengers on the cancelled flight
    #[arg(short, long, default_value_t = 12)]
    passengers: usize,

    /// Seed for broker and simulated stages
    #[arg(long)]
    seed: Option<u64>,

    /// Short passenger think-times and tight polling
    #[arg(long)]
    fast: bool,

    /// Print the full report as JSON instead of text
    #[arg(long)]
    report_json: bool,

    /// Log level
    #[arg(long, env = "IROPS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "IROPS_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let mut config =
        RuntimeConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if cli.fast {
        let demo = RuntimeConfig::demo();
        config.broker = demo.broker;
        config.collector = demo.collector;
    }
    if let Some(seed) = cli.seed {
        config.broker.seed = Some(seed);
        config.simulation.seed = Some(seed);
    }
    config.validate()?;

    let broker = Arc::new(CommsBroker::new(config.broker.clone()));
    let registry = simulated_registry(broker.clone(), config.collector.clone(), &config.simulation);
    let driver = WorkflowDriver::new(registry, config.driver.clone());

    let snapshot = cli.scenario.snapshot();
    let mut ctx = cli
        .scenario
        .seed_context(cli.passengers)
        .context("failed to seed scenario context")?;

    let result = driver.run(snapshot, &mut ctx).await;
    let shutdown = broker.shutdown().await;
    let report = result?;

    if cli.report_json {
        let output = serde_json::json!({
            "scenario": cli.scenario,
            "report": report,
            "context": ctx,
            "broker": shutdown.stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  IROPS scenario: {}", cli.scenario);
    println!("  Run:            {}", report.run.run_id);
    println!("  Analysis:       {}", snapshot.analysis_summary());
    println!("  Sequence:       {}", format_sequence(report.run.sequence()));
    println!("  Routing:        {}", report.run.routing_logic);
    println!();

    for execution in &report.executions {
        let status = match &execution.outcome {
            StageOutcome::Succeeded => "ok".to_string(),
            StageOutcome::Flagged { reason } => format!("FLAGGED ({})", reason),
        };
        println!(
            "  [{}] {:<16} attempts={} {}ms {}",
            execution.step + 1,
            execution.stage.as_str(),
            execution.attempts,
            execution.duration_ms,
            status
        );
    }

    println!();
    for message in ctx.messages() {
        match message.stage {
            Some(stage) => println!("  {:<16} {}", stage.as_str(), message.text),
            None => println!("  {:<16} {}", "-", message.text),
        }
    }

    let stats = shutdown.stats;
    println!();
    println!(
        "  Broker: received={} processed={} accepted={} declined={} cancelled={}",
        stats.received, stats.processed, stats.accepted, stats.declined, stats.cancelled
    );
    if let Some(rate) = stats.acceptance_rate() {
        println!("  Acceptance rate: {:.1}%", rate);
    }
    for warning in &report.warnings {
        println!("  WARNING: {}", warning);
    }

    Ok(())
}
