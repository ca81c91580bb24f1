#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs Fermata sessions and engine workers.

mod config;
mod session;
mod worker;

use std::{
    io::{self, BufWriter},
    path::PathBuf,
};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use self::config::{OutputFormat, Overrides, SessionConfig};

/// Boid cloud simulation behind the Fermata installation.
#[derive(Debug, Parser)]
#[command(name = "fermata", version)]
struct Cli {
    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Runs every cloud engine and the group engine through the consumer loop.
    Run(RunArgs),
    /// Serves one engine over newline-delimited JSON on stdin and stdout.
    Worker(WorkerArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// TOML session configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Consumer ticks to run.
    #[arg(long)]
    frames: Option<u64>,
    /// Seed for initial positions and every engine's period offset.
    #[arg(long)]
    seed: Option<u64>,
    /// Tick on which every engine is reset.
    #[arg(long)]
    reset_at: Option<u64>,
    /// Presentation output format.
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// Pace ticks against the wall clock instead of simulated time.
    #[arg(long)]
    realtime: bool,
}

#[derive(Debug, Args)]
struct WorkerArgs {
    /// Seed that replaces the one carried by `init`.
    #[arg(long)]
    seed: Option<u64>,
    /// Advance the engine clock by `1 / fps` per step instead of wall time.
    #[arg(long, value_name = "FPS")]
    fixed_step: Option<u32>,
}

/// Entry point for the Fermata command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        CliCommand::Run(args) => {
            let mut config = SessionConfig::load(args.config.as_deref())?;
            config.apply(Overrides {
                frames: args.frames,
                seed: args.seed,
                reset_at: args.reset_at,
                format: args.format,
                realtime: args.realtime,
            });
            session::run(&config, BufWriter::new(io::stdout().lock()))
        }
        CliCommand::Worker(args) => {
            let options = worker::WorkerOptions {
                seed: args.seed,
                fixed_step: args.fixed_step,
            };
            worker::serve(options, io::stdin().lock(), io::stdout().lock())
        }
    }
}

fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .with_context(|| format!("invalid log filter `{default_filter}`"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init()
        .map_err(|error| anyhow!("failed to install log subscriber: {error}"))
}
