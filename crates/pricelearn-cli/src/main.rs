//! CLI for pricelearn.
//!
//! Asks the pricing agent for price suggestions, feeds it observed outcomes
//! (one at a time or replayed from a JSONL file) and inspects what it has
//! learned. All commands share one persisted model file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pricelearn_agent::{AgentConfig, PricingAgent};
use pricelearn_core::{PricingFeedback, PricingPolicy, PricingRequest};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    agent: AgentArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Default)]
struct AgentArgs {
    /// JSON file with agent settings (alpha, gamma, epsilon, model_path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the model file (overrides config)
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Learning rate (overrides config)
    #[arg(long, global = true)]
    alpha: Option<f64>,

    /// Discount factor (overrides config)
    #[arg(long, global = true)]
    gamma: Option<f64>,

    /// Exploration rate (overrides config)
    #[arg(long, global = true)]
    epsilon: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Suggest a price for the given retail signals
    Suggest {
        #[command(flatten)]
        signals: SignalArgs,
    },
    /// Learn from the outcome of an applied price
    Learn {
        #[command(flatten)]
        signals: SignalArgs,

        /// Multiplier that was applied (0.8, 0.9, 1.0, 1.1 or 1.2)
        #[arg(long)]
        multiplier: f64,

        /// Realized profit, used as the reward
        #[arg(long, allow_hyphen_values = true)]
        profit: f64,
    },
    /// Replay feedback records from a JSONL file
    Replay {
        /// Input file path
        #[arg(long)]
        path: PathBuf,

        /// Start from line number (0-based)
        #[arg(long, default_value = "0")]
        line_offset: u64,
    },
    /// Print the learned policy
    Inspect,
}

#[derive(Args)]
struct SignalArgs {
    #[arg(long)]
    product: Option<String>,

    #[arg(long)]
    base_price: f64,

    #[arg(long, allow_hyphen_values = true)]
    stock: i64,

    #[arg(long, allow_hyphen_values = true)]
    days: i64,

    #[arg(long)]
    competitor_price: f64,
}

impl From<SignalArgs> for PricingRequest {
    fn from(a: SignalArgs) -> Self {
        PricingRequest {
            product_name: a.product,
            base_price: a.base_price,
            current_stock: a.stock,
            days_to_expiry: a.days,
            competitor_price: a.competitor_price,
        }
    }
}

#[derive(Serialize, Debug)]
struct ReplaySummary {
    processed: u64,
    next_line_offset: u64,
}

fn resolve_config(args: &AgentArgs) -> Result<AgentConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file {}", path.display()))?;
            serde_json::from_reader(file)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => AgentConfig::default(),
    };
    if let Some(model) = &args.model {
        config.model_path = model.clone();
    }
    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if let Some(gamma) = args.gamma {
        config.gamma = gamma;
    }
    if let Some(epsilon) = args.epsilon {
        config.epsilon = epsilon;
    }
    Ok(config)
}

/// Feeds every non-blank line from `offset` on to the agent.
///
/// Stops at the first malformed or rejected record; the line number is part
/// of the error.
fn replay_file(agent: &PricingAgent, path: &Path, offset: u64) -> Result<ReplaySummary> {
    let f = File::open(path).context("Failed to open input file")?;
    let reader = BufReader::new(f);
    let mut processed = 0;
    let mut lines_read = 0;

    for (idx, line) in reader.lines().enumerate() {
        if (idx as u64) < offset {
            continue;
        }
        let line = line?;
        lines_read += 1;
        if line.trim().is_empty() {
            continue;
        }
        let feedback: PricingFeedback = serde_json::from_str(&line)
            .with_context(|| format!("Malformed feedback on line {idx}"))?;
        agent
            .record_feedback(&feedback)
            .with_context(|| format!("Rejected feedback on line {idx}"))?;
        processed += 1;
    }

    let next_line_offset = offset.checked_add(lines_read).context("Cursor overflow")?;
    Ok(ReplaySummary {
        processed,
        next_line_offset,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = resolve_config(&cli.agent)?;
    let agent = PricingAgent::new(config).context("Failed to start pricing agent")?;

    match cli.command {
        Commands::Suggest { signals } => {
            let suggestion = agent.optimize(&signals.into())?;
            print_json(&suggestion)?;
        }
        Commands::Learn {
            signals,
            multiplier,
            profit,
        } => {
            let feedback = PricingFeedback {
                request: signals.into(),
                applied_multiplier: multiplier,
                realized_profit: profit,
            };
            let ack = agent.record_feedback(&feedback)?;
            print_json(&ack)?;
        }
        Commands::Replay { path, line_offset } => {
            let summary = replay_file(&agent, &path, line_offset)?;
            if let Err(e) = agent.flush() {
                tracing::warn!("final flush failed: {e}");
            }
            print_json(&summary)?;
        }
        Commands::Inspect => {
            print_json(&agent.report()?)?;
        }
    }

    Ok(())
}
