//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Attendance dashboard for the rota API.
///
/// Fetches shifts, clock records, exception events and presence for a day,
/// classifies each shift's attendance and prints the board grouped by start
/// time.
#[derive(Debug, Parser)]
#[command(name = "rota", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the day's shifts grouped by start time.
    Board(BoardArgs),

    /// Show hours and the activity log for one shift.
    Shift {
        /// The shift id.
        shift_id: String,

        #[command(flatten)]
        day: DayArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show who is active, idle or offline.
    Presence {
        #[command(flatten)]
        day: DayArgs,

        /// Only people with this job title (repeatable).
        #[arg(long = "job-title")]
        job_titles: Vec<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Remove an exception event.
    RemoveEvent {
        /// The event id.
        event_id: String,
    },

    /// Keep the board on screen, refreshing as data changes.
    Watch {
        #[command(flatten)]
        board: BoardArgs,

        /// Exit after the first complete board.
        #[arg(long)]
        once: bool,
    },
}

/// Which day to show and the moment to evaluate it at.
#[derive(Debug, Clone, Default, Args)]
pub struct DayArgs {
    /// Day to show: YYYY-MM-DD, today, yesterday, tomorrow, or "N days ago".
    #[arg(short, long)]
    pub date: Option<String>,

    /// Evaluate as of this local time instead of now (YYYY-MM-DD HH:MM).
    #[arg(long)]
    pub at: Option<String>,
}

/// Board selection and filters.
#[derive(Debug, Clone, Default, Args)]
pub struct BoardArgs {
    #[command(flatten)]
    pub day: DayArgs,

    /// Only rows with this job title (repeatable; any match passes).
    #[arg(long = "job-title")]
    pub job_titles: Vec<String>,

    /// Only rows with this status (repeatable; any match passes).
    #[arg(long = "status")]
    pub statuses: Vec<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}
