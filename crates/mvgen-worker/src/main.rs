//! Music video pipeline binary.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mvgen_models::{RunConfig, RunState};
use mvgen_worker::{clients, PipelineOrchestrator, RunRegistry, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "mvgen-worker", version, about = "Generate and publish a music video")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a fresh run at PLAN
    Start(RunArgs),
    /// Resume from the artifacts already on disk
    Resume(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// JSON run request
    #[arg(long, env = "MVGEN_RUN_CONFIG")]
    config: PathBuf,
}

fn load_run_config(path: &Path) -> anyhow::Result<RunConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading run config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing run config {}", path.display()))
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("mvgen=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let (resume, args) = match cli.command {
        Command::Start(args) => (false, args),
        Command::Resume(args) => (true, args),
    };

    let run_config = load_run_config(&args.config)?;
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);
    config.validate()?;

    let collaborators = clients::from_config(&config)?;
    let registry = RunRegistry::new(PipelineOrchestrator::new(config.layout(), collaborators));

    let run_id = if resume {
        registry.resume(run_config).await?
    } else {
        registry.start(run_config).await?
    };
    info!(run_id = %run_id, "Run {}", if resume { "resumed" } else { "started" });

    let mut updates = registry.subscribe(&run_id).await?;
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let update = updates.borrow_and_update().clone();
            info!(
                stage = %update.stage,
                percent = update.percent,
                "{}", update.detail
            );
        }
    });

    let cancel_registry = registry.clone();
    let cancel_id = run_id.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling run");
            cancel_registry.cancel(&cancel_id).await.ok();
        }
    });

    let status = registry.wait(&run_id).await?;
    match status.state {
        RunState::Done => {
            info!("Run complete");
            Ok(())
        }
        _ => {
            error!("Run failed: {}", status.progress.detail);
            std::process::exit(1);
        }
    }
}
