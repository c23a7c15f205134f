//! Fanout CLI - run shell commands with a concurrency limit.

mod commands;

use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fanout_core::{ConfigError, FailurePolicy, RunnerConfig};
use fanout_execution::Runner;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{read_command_file, run_shell};

#[derive(Parser)]
#[command(name = "fanout")]
#[command(about = "Run commands with a concurrency limit", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run shell commands, printing their output in input order
    Run {
        /// Max commands running at once (overrides the config file)
        #[arg(short = 'j', long)]
        max_concurrency: Option<usize>,
        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Failure policy: stop-claiming or continue
        #[arg(long)]
        policy: Option<String>,
        /// Read commands from a file, one per line
        #[arg(long)]
        file: Option<PathBuf>,
        /// Wait for the commands without printing their output
        #[arg(long)]
        discard_output: bool,
        /// Commands to run
        commands: Vec<String>,
    },
    /// Load a config file and show the effective settings
    CheckConfig {
        /// Config file path
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            max_concurrency,
            config,
            policy,
            file,
            discard_output,
            commands,
        } => {
            let mut runner_config = match config {
                Some(path) => RunnerConfig::load(&path)?,
                None => RunnerConfig::default().with_max_concurrency(
                    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
                ),
            };
            if let Some(max) = max_concurrency {
                let max = NonZeroUsize::new(max).ok_or(ConfigError::InvalidConcurrency(max))?;
                runner_config = runner_config.with_max_concurrency(max);
            }
            if let Some(policy) = policy {
                let policy = parse_policy(&policy)
                    .ok_or_else(|| anyhow::anyhow!("Unknown failure policy: {}", policy))?;
                runner_config = runner_config.with_failure_policy(policy);
            }

            let mut all_commands = match file {
                Some(path) => read_command_file(&path)?,
                None => Vec::new(),
            };
            all_commands.extend(commands);
            if all_commands.is_empty() {
                anyhow::bail!("No commands given");
            }

            run(runner_config, &all_commands, discard_output).await?;
        }
        Commands::CheckConfig { path } => {
            let config = RunnerConfig::load(&path)?;
            println!("Config: {}", path.display());
            println!("  Max concurrency: {}", config.max_concurrency);
            println!("  Failure policy: {}", config.failure_policy);
        }
    }

    Ok(())
}

async fn run(config: RunnerConfig, commands: &[String], discard_output: bool) -> Result<()> {
    let runner = Runner::new(config);

    let token = runner.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for running commands to finish");
            token.cancel();
        }
    });

    if discard_output {
        let operations = commands
            .iter()
            .map(|command| move || async move { run_shell(command).await.map(|_| ()) });
        runner.run_all(operations).await?;
    } else {
        let operations = commands.iter().map(|command| move || run_shell(command));
        let outputs = runner.collect_all(operations).await?;

        for output in outputs {
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
        }
    }

    info!("Completed {} commands", commands.len());
    Ok(())
}

fn parse_policy(s: &str) -> Option<FailurePolicy> {
    match s.to_lowercase().replace('_', "-").as_str() {
        "stop-claiming" | "stop" => Some(FailurePolicy::StopClaiming),
        "continue" => Some(FailurePolicy::Continue),
        _ => None,
    }
}
