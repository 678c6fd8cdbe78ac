//! Command-line interface definitions.
//!
//! Defines the CLI structure for the hindsight application using `clap`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::domain::period::PeriodId;

/// Config file read when `--config` is not given, if present.
pub const DEFAULT_CONFIG: &str = "hindsight.toml";

/// Prediction validation and adaptive learning engine
#[derive(Parser, Debug)]
#[command(name = "hindsight")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file [default: hindsight.toml if present]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler in the foreground until interrupted
    Run,

    /// Run one validation pass over pending predictions
    Evaluate(EvaluateArgs),

    /// Aggregate and synthesize one period
    Learn(LearnArgs),

    /// Show the latest insight or the one for a period
    Insight(InsightArgs),

    /// Report store backend and engine health
    Health,
}

/// Arguments for `hindsight evaluate`.
#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// Evaluate as of this RFC 3339 instant instead of now
    #[arg(long)]
    pub as_of: Option<DateTime<Utc>>,
}

/// Arguments for `hindsight learn`.
#[derive(Parser, Debug)]
pub struct LearnArgs {
    /// Period to learn, e.g. `2025-W20` or `2025-05`
    #[arg(long)]
    pub period: PeriodId,
}

/// Arguments for `hindsight insight`.
#[derive(Parser, Debug)]
pub struct InsightArgs {
    /// Show this period instead of the latest
    #[arg(long)]
    pub period: Option<PeriodId>,

    /// List every stored insight, oldest first
    #[arg(long, conflicts_with = "period")]
    pub history: bool,
}
