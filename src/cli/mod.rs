use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "club-reporter",
    about = "Weekly Strava club challenge reporter"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch the club feed once and update the weekly table.
    Run {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long)]
        stop_after: Option<usize>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Print the stored weekly table and rewrite its CSV export.
    Report {
        #[arg(long)]
        week: Option<u32>,
    },
    /// Pre-seed challenge week ranges. The start date must be a Monday.
    SeedWeeks {
        #[arg(long)]
        start: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[arg(long)]
        first_week: Option<u32>,
    },
    /// List the registered athletes.
    Athletes,
    Status,
    Doctor,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Run the foreground scheduler (daily report at the configured time).
    Service,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
