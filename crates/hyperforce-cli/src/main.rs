//! hyperforce CLI - run and benchmark the hypergraph layout engine.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod generate;

use commands::{bench, config as config_cmd, run};
use config::Config;
use generate::GeneratorSpec;

/// hyperforce - parallel force-directed layout for hypergraphs.
///
/// Generates a random hypergraph and lays it out with Barnes-Hut repulsion
/// and star-shaped hyperedge springs.
#[derive(Parser, Debug)]
#[command(
    name = "hf",
    author,
    version,
    about = "hyperforce: parallel hypergraph layout",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Lay out a generated hypergraph until it settles.
    Run {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Maximum number of ticks (stops earlier once settled).
        #[arg(short, long)]
        ticks: Option<u32>,

        /// Write final positions and topology as JSON.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Measure tick throughput and per-stage timings.
    Bench {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Ticks to run before measuring.
        #[arg(long, default_value_t = 5)]
        warmup: u32,

        /// Ticks to measure.
        #[arg(short, long, default_value_t = 50)]
        ticks: u32,
    },

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Shape of the generated hypergraph; unset values come from the config.
#[derive(Args, Debug)]
struct DatasetArgs {
    /// Number of nodes.
    #[arg(short, long)]
    nodes: Option<u32>,

    /// Number of hyperedges.
    #[arg(short, long)]
    edges: Option<u32>,

    /// Largest hyperedge size.
    #[arg(long)]
    max_edge_size: Option<u32>,

    /// Random seed.
    #[arg(long)]
    seed: Option<u64>,
}

impl DatasetArgs {
    fn resolve(&self, config: &Config) -> GeneratorSpec {
        GeneratorSpec {
            nodes: self.nodes.unwrap_or(config.run.nodes),
            edges: self.edges.unwrap_or(config.run.edges),
            max_edge_size: self.max_edge_size.unwrap_or(config.run.max_edge_size),
            seed: self.seed.unwrap_or(config.run.seed),
        }
    }
}

/// Engine overrides applied on top of the loaded config.
#[derive(Args, Debug)]
struct EngineArgs {
    /// Worker threads (0 = one per core).
    #[arg(long)]
    threads: Option<usize>,

    /// Barnes-Hut opening angle.
    #[arg(long)]
    theta: Option<f32>,
}

impl EngineArgs {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(threads) = self.threads {
            config.engine.threads = threads;
        }
        if let Some(theta) = self.theta {
            config.simulation.theta = theta;
        }
        config.validate()
    }
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Dotted key, e.g. `simulation.theta`.
        key: String,
        /// Configuration value.
        value: String,
    },

    /// Get a configuration value.
    Get {
        /// Dotted key, e.g. `engine.threads`.
        key: String,
    },

    /// Reset configuration to defaults.
    Reset,

    /// Show path to config file.
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    // RUST_LOG takes precedence over the verbosity flags
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .init();

    let mut config = Config::load()?;

    match cli.command {
        Commands::Run {
            dataset,
            engine,
            ticks,
            output,
        } => {
            engine.apply(&mut config)?;
            let options = run::RunOptions {
                generator: dataset.resolve(&config),
                max_ticks: ticks.unwrap_or(config.run.ticks),
                progress_interval: config.run.progress_interval,
                output,
            };
            run::execute(&config, options).await?;
        }

        Commands::Bench {
            dataset,
            engine,
            warmup,
            ticks,
        } => {
            engine.apply(&mut config)?;
            let options = bench::BenchOptions {
                generator: dataset.resolve(&config),
                warmup,
                ticks,
            };
            bench::execute(&config, &options)?;
        }

        Commands::Config(config_cmd_inner) => match config_cmd_inner {
            ConfigCommands::Show => {
                config_cmd::show(&config)?;
            }
            ConfigCommands::Set { key, value } => {
                let mut stored = Config::load_file()?;
                config_cmd::set(&mut stored, &key, &value)?;
            }
            ConfigCommands::Get { key } => {
                config_cmd::get(&config, &key)?;
            }
            ConfigCommands::Reset => {
                config_cmd::reset()?;
            }
            ConfigCommands::Path => {
                config_cmd::path();
            }
        },
    }

    Ok(())
}
