use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "verdict", about = "Offline auditor for retrieval-check rounds")]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Re-evaluate recorded measurements and write the annotated results
    Evaluate(EvaluateArgs),
    /// Print the tasks each station is allowed to report
    Allocate(AllocateArgs),
}

#[derive(Args)]
pub struct EvaluateArgs {
    /// NDJSON file of `{"roundIndex": .., "measurement": {..}}` lines
    pub measurements: PathBuf,

    /// JSON round details: one object, or a map from round index to details
    #[arg(long)]
    pub round_details: PathBuf,

    /// Hex-encoded beacon randomness (required unless fraud detection is off)
    #[arg(long)]
    pub randomness: Option<String>,

    /// TOML evaluator config
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overrides `required_committee_size` from the config
    #[arg(long)]
    pub required_committee_size: Option<usize>,

    /// Accept every measurement without allocation, arbitration or consensus
    #[arg(long)]
    pub no_fraud_detection: bool,

    /// Also write measurements rejected at the tasking stage
    #[arg(long)]
    pub keep_rejected: bool,

    /// Round contract address passed to the round details source
    #[arg(long, default_value = "")]
    pub contract: String,

    /// Directory the evaluation files are written to
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args)]
pub struct AllocateArgs {
    /// JSON round details: one object, or a map from round index to details
    #[arg(long)]
    pub round_details: PathBuf,

    /// Hex-encoded beacon randomness
    #[arg(long)]
    pub randomness: String,

    /// Round to pick when the details file holds several
    #[arg(long, default_value_t = 0)]
    pub round: u64,

    /// Station ids to allocate tasks for
    #[arg(required = true)]
    pub stations: Vec<String>,
}
