//! CLI entrypoint for conclave
//!
//! Wires together all layers with dependency injection: loads
//! configuration, builds the OpenRouter gateway and the run store, submits
//! one consensus run, and polls its status until it reaches a terminal
//! state.

use anyhow::{Result, anyhow, bail};
use clap::Parser;
use conclave_application::{ChannelSupervisor, RunRepository, SubmitRunRequest};
use conclave_domain::{Model, RunState};
use conclave_infrastructure::{
    ConfigLoader, InMemoryRunRepository, OpenRouterGateway, RestRunRepository, RestThreadWriter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conclave", version, about = "Run a multi-agent consensus discussion")]
struct Cli {
    /// The task the agents should reach consensus on
    task: Option<String>,

    /// Moderator model id (e.g. anthropic/claude-sonnet-4)
    #[arg(short, long)]
    moderator: Option<String>,

    /// Participant model id; repeat for each participant
    #[arg(short = 'p', long = "participant")]
    participants: Vec<String>,

    /// Maximum number of discussion rounds (1-20)
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Path to an explicit config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip config file discovery and use built-in defaults
    #[arg(long)]
    no_config: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Only print the final answer
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    // The non-blocking writer guard has to outlive main
    let _log_guard = match &cli.log_file {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "conclave.log".to_string());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            None
        }
    };

    info!("Starting conclave");

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {e}"))?
    };

    let task = match cli.task {
        Some(task) => task,
        None => bail!("A task is required. Pass it as the first argument."),
    };

    let moderator: Model = match &cli.moderator {
        Some(id) => id.parse().expect("model parsing is infallible"),
        None => Model::default_moderator(),
    };
    let participants: Vec<Model> = if cli.participants.is_empty() {
        Model::default_participants()
    } else {
        cli.participants
            .iter()
            .map(|id| id.parse().expect("model parsing is infallible"))
            .collect()
    };
    let max_rounds = cli.max_rounds.unwrap_or(config.channel.max_rounds);

    // === Dependency Injection ===
    let gateway = Arc::new(OpenRouterGateway::from_config(&config.gateway)?);

    // Durable store if configured, process-local otherwise
    let repository: Arc<dyn RunRepository> =
        match RestRunRepository::from_config(&config.persistence) {
            Some(rest) => Arc::new(rest),
            None => Arc::new(InMemoryRunRepository::new()),
        };

    let mut supervisor =
        ChannelSupervisor::with_workers(gateway, repository, config.runner.workers);
    if let Some(writer) = RestThreadWriter::from_config(&config.persistence) {
        supervisor = supervisor.with_thread_writer(Arc::new(writer));
    }

    if !cli.quiet {
        println!();
        println!("Task: {task}");
        println!("Moderator: {moderator}");
        println!(
            "Participants: {}",
            participants
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("Round budget: {max_rounds}");
        println!();
    }

    let request =
        SubmitRunRequest::new(task, moderator, participants).with_max_rounds(max_rounds);
    let run_id = supervisor.submit(request).await?;
    info!("Run {} submitted", run_id);

    // Poll until the run reaches a terminal state
    let mut last_round = 0;
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;

        let Some(status) = supervisor.status(&run_id).await? else {
            bail!("Run {run_id} disappeared from the status table");
        };

        if !cli.quiet && status.rounds_executed > last_round {
            last_round = status.rounds_executed;
            println!("Round {last_round}...");
        }

        match status.state {
            RunState::Finished => {
                if !cli.quiet {
                    println!();
                    println!("=== Answer ===");
                }
                println!("{}", status.answer.unwrap_or_default());
                return Ok(());
            }
            RunState::Error => {
                bail!(
                    "Run failed: {}",
                    status.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
            RunState::Pending | RunState::Running => {}
        }
    }
}
