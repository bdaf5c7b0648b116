//! CLI command definitions for bujo
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod commands;

use crate::catchup::Decision;
use crate::format::OutputFormat;
use crate::wizard::{Month, WizardAction};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Bullet journal migration engine and HTTP API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// User to act as (overrides config)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format for command results
    #[arg(short, long, value_enum, default_value = "markdown", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API (default if no subcommand given)
    Serve(ServeArgs),

    #[command(flatten)]
    Journal(JournalCommand),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(long)]
    pub bind: Option<String>,
}

/// Commands that run once against the journal and print a result.
#[derive(Subcommand, Debug)]
pub enum JournalCommand {
    /// Add a task, event or note
    Add(AddArgs),

    /// Show the daily log
    Day {
        /// Day to show (default: today)
        date: Option<NaiveDate>,

        /// Only entries whose content contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show the monthly log
    Month {
        /// Month as YYYY-MM (default: this month)
        month: Option<Month>,
    },

    /// Show the future log for a year
    Future {
        /// Year (default: this year)
        year: Option<i32>,
    },

    /// List incomplete tasks dated before a day
    Pending {
        /// Cut-off day, exclusive (default: today)
        #[arg(long)]
        before: Option<NaiveDate>,
    },

    /// Review stale tasks and apply catch-up decisions
    CatchUp(CatchUpArgs),

    /// Close a task as migrated and carry it forward
    Migrate {
        id: String,

        /// Target day (default: the day after the task's date)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Date recorded as the original (default: the task's date)
        #[arg(long)]
        from: Option<NaiveDate>,
    },

    /// Close a task as scheduled onto a future day
    Schedule {
        id: String,

        /// Day to schedule onto
        date: NaiveDate,

        /// Date recorded as the original (default: the task's date)
        #[arg(long)]
        from: Option<NaiveDate>,
    },

    /// Cancel a task
    Cancel {
        id: String,

        /// Date recorded as the original (default: the task's date)
        #[arg(long)]
        from: Option<NaiveDate>,
    },

    /// Toggle a task between complete and incomplete
    Complete { id: String },

    /// Bring a cancelled task back
    Reactivate { id: String },

    /// Monthly bulk migration wizard
    Wizard(WizardArgs),

    /// Show the ledger for one task row
    History { task_id: String },

    /// Show migration totals
    Stats,

    /// Show every row of a lineage and its ledger
    Lineage { lineage_id: String },

    /// Find and fix interrupted migrations
    Repair {
        /// Write the missing rows and records instead of only reporting
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Entry text
    pub content: String,

    /// Day for the entry (default: today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Add an event instead of a task
    #[arg(long, conflicts_with = "note")]
    pub event: bool,

    /// Add a note instead of a task
    #[arg(long)]
    pub note: bool,

    /// Event start time, HH:MM
    #[arg(long, requires = "event", value_parser = parse_time)]
    pub time: Option<NaiveTime>,

    /// Mark as priority
    #[arg(long)]
    pub priority: bool,

    /// Mark as inspiration
    #[arg(long)]
    pub inspiration: bool,

    /// Mark as something to explore
    #[arg(long)]
    pub explore: bool,
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| format!("expected HH:MM, got {:?}", s))
}

/// Parse `ID=DECISION` where decision is `migrate`, `keep`, `cancel` or a date.
pub fn parse_decision_arg(s: &str) -> Result<(String, Decision), String> {
    let (id, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=DECISION, got {:?}", s))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing task id in {:?}", s));
    }
    let decision = Decision::parse(raw.trim()).ok_or_else(|| {
        format!(
            "unknown decision {:?}; use migrate, keep, cancel or YYYY-MM-DD",
            raw
        )
    })?;
    Ok((id.to_string(), decision))
}

#[derive(Args, Debug, Default)]
pub struct CatchUpArgs {
    /// Day being viewed (default: today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Decisions to apply, in order: ID=migrate|keep|cancel|YYYY-MM-DD
    #[arg(long, value_name = "ID=DECISION", value_parser = parse_decision_arg)]
    pub apply: Vec<(String, Decision)>,
}

#[derive(Args, Debug, Default)]
pub struct WizardArgs {
    /// Month to review as YYYY-MM (default: this month)
    #[arg(long)]
    pub month: Option<Month>,

    /// Run a bulk action on the selection
    #[arg(long, value_name = "migrate|cancel")]
    pub apply: Option<WizardAction>,

    /// Select the suggested tasks
    #[arg(long, requires = "apply", conflicts_with_all = ["all", "ids"])]
    pub suggested: bool,

    /// Select every candidate
    #[arg(long, requires = "apply", conflicts_with = "ids")]
    pub all: bool,

    /// Select these task ids
    #[arg(long, requires = "apply", value_delimiter = ',')]
    pub ids: Vec<String>,
}
