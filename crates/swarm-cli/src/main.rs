mod simulate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use swarm_core::analysis::Prioritizer;
use swarm_core::impls::{BinaryImage, InMemoryBinary};
use swarm_core::ports::{BinaryView, TargetEnumerator};
use swarm_core::SwarmConfig;

use crate::simulate::SimulationOptions;

#[derive(Parser)]
#[command(name = "swarm", about = "Prioritize and schedule per-function analysis agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the prioritized analysis order.
    Plan {
        #[command(flatten)]
        input: InputArgs,

        /// Number of entries to print (0 prints all)
        #[arg(long, default_value_t = 20)]
        top: usize,
    },

    /// Run a full analysis against simulated agents.
    Run {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        simulation: SimulationOptions,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Binary description (JSON)
    #[arg(long, env = "SWARM_BINARY")]
    binary: PathBuf,

    /// Configuration file (JSON); defaults apply when omitted
    #[arg(long, env = "SWARM_CONFIG")]
    config: Option<PathBuf>,

    /// Override scheduler.max_concurrency
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Override scheduler.max_retries
    #[arg(long)]
    max_retries: Option<u32>,
}

impl InputArgs {
    fn load(&self) -> Result<(Arc<InMemoryBinary>, SwarmConfig)> {
        let binary = load_binary(&self.binary)?;

        let mut config = match &self.config {
            Some(path) => SwarmConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => SwarmConfig::default(),
        };
        if let Some(n) = self.max_concurrency {
            config.scheduler.max_concurrency = n;
        }
        if let Some(n) = self.max_retries {
            config.scheduler.max_retries = n;
        }
        config.validate().context("invalid configuration")?;

        Ok((Arc::new(binary), config))
    }
}

fn load_binary(path: &Path) -> Result<InMemoryBinary> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading binary description {}", path.display()))?;
    let image = BinaryImage::from_json_str(&raw)
        .with_context(|| format!("parsing binary description {}", path.display()))?;
    Ok(InMemoryBinary::from(image))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("swarm=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Plan { input, top } => plan(&input, top),
        Command::Run { input, simulation } => {
            let (binary, config) = input.load()?;
            simulate::run(binary, config, simulation).await
        }
    }
}

fn plan(input: &InputArgs, top: usize) -> Result<()> {
    let (binary, config) = input.load()?;
    let view: Arc<dyn BinaryView> = binary.clone();
    let prioritizer = Prioritizer::from_config(view, &config.heuristics)?;

    let targets = binary.enumerate();
    let jobs = prioritizer.prioritize(&targets);
    let shown = if top == 0 { jobs.len() } else { top.min(jobs.len()) };

    println!(
        "{} analyzable functions, showing {}",
        jobs.len(),
        shown
    );
    for (i, job) in jobs.iter().take(shown).enumerate() {
        println!(
            "{:>4}. {:<12} {:<28} {:>8.1}  {}",
            i + 1,
            job.target().to_string(),
            binary.display_name(job.target()),
            job.score(),
            job.reason()
        );
    }
    Ok(())
}
