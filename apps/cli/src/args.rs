use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracker_core::UsagePeriod;

#[derive(Debug, Parser)]
#[command(name = "usage-tracker", version, about = "Token usage and cost from local API logs")]
pub struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path overriding the config file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import new log lines and print today's and the last 30 days' usage.
    Refresh,
    /// Usage totals for one period.
    Summary {
        #[arg(long, default_value = "30d", value_parser = parse_period)]
        period: UsagePeriod,
        /// Import new log lines first.
        #[arg(long)]
        refresh: bool,
    },
    /// Token counts per model for one period.
    Models {
        #[arg(long, default_value = "30d", value_parser = parse_period)]
        period: UsagePeriod,
        #[arg(long)]
        refresh: bool,
    },
    /// Summarize the logs directly, without touching the database.
    Scan,
    /// Delete records and file progress older than the retention window.
    Sweep,
    /// Recompute stored costs with the current pricing.
    BackfillCosts,
    /// Forget read progress for one log file so it is read again in full.
    Reset { file: PathBuf },
    /// Print the effective configuration.
    Config,
}

fn parse_period(value: &str) -> Result<UsagePeriod, String> {
    value.parse()
}
