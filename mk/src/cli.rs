//! CLI command definitions and subcommands

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use crate::dates;

/// mk - keep TODO/FIXME comments and tracked reminders in sync
#[derive(Debug, Parser)]
#[command(
    name = "mk",
    author,
    version,
    about = "Track TODO/FIXME comments, their due dates and status",
    long_about = None,
    after_help = log_path_help()
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Workspace root (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan the workspace and print a summary
    Scan,

    /// List detected comments
    List {
        /// Which comments to show
        #[arg(short, long, value_enum, default_value_t = Filter::Open)]
        filter: Filter,
    },

    /// Mark a comment completed without touching the source
    Complete {
        /// Comment id
        id: String,
    },

    /// Reopen a completed or snoozed comment
    Reopen {
        /// Comment id
        id: String,
    },

    /// Snooze a comment until a date
    Snooze {
        /// Comment id
        id: String,

        /// YYYY-MM-DD, today, tomorrow, next-week or next-month
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
    },

    /// Write a due date into the comment
    Due {
        /// Comment id
        id: String,

        /// YYYY-MM-DD, today, tomorrow, next-week or next-month
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
    },

    /// Remove the due date from the comment
    Undue {
        /// Comment id
        id: String,
    },

    /// Rewrite the marker to DONE and mark the comment completed
    Done {
        /// Comment id
        id: String,
    },

    /// Delete the comment's whole line from the source file
    Delete {
        /// Comment id
        id: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Print the comment's location and line
    Goto {
        /// Comment id
        id: String,
    },

    /// Print open and due counts
    Counts,
}

/// Views offered by `mk list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Filter {
    Open,
    All,
    Overdue,
    Today,
    Week,
    NoDate,
    Completed,
}

/// Parse a date argument the same way due-date tokens are read
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    debug!(%raw, "parse_date: called");
    dates::resolve_token(raw, dates::today())
        .ok_or_else(|| format!("invalid date '{}': expected YYYY-MM-DD, today, tomorrow, next-week or next-month", raw))
}

/// Log file location
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("marksync")
        .join("logs")
        .join("marksync.log")
}

fn log_path_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}
