use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tend_core::models::Cadence;

#[derive(Parser)]
#[command(name = "tend")]
#[command(about = "Tasks, habits and money from the command line, offline first")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional engine config file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage habits
    Habit {
        #[command(subcommand)]
        command: HabitCommands,
    },
    /// Record an expense (or income with --income)
    Spend {
        /// Amount, always positive
        amount: f64,
        /// Category, e.g. groceries
        category: String,
        /// Record as income instead of an expense
        #[arg(long)]
        income: bool,
        /// Optional note
        #[arg(long)]
        note: Option<String>,
    },
    /// Print every domain as one user document (JSON)
    Export {
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Merge an exported user document into local data
    Reconcile {
        /// Path to a user document JSON file
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show session, calendar and record counts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Calendar integration
    Calendar {
        #[command(subcommand)]
        command: CalendarCommands,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task
    #[command(alias = "new")]
    Add {
        /// Task title
        title: Vec<String>,
        /// List ID to file the task under
        #[arg(long, value_name = "ID")]
        list: Option<String>,
        /// Due date (YYYY-MM-DD) or timestamp (RFC 3339)
        #[arg(long, value_name = "WHEN")]
        due: Option<String>,
    },
    /// List open tasks
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a task as done
    Done {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Delete a task
    Remove {
        /// Task ID or unique ID prefix
        id: String,
        /// Remove the record outright instead of flagging it deleted
        #[arg(long)]
        hard: bool,
    },
}

#[derive(Subcommand)]
pub enum HabitCommands {
    /// Create a habit
    Add {
        /// Habit name
        name: Vec<String>,
        #[arg(long, value_enum, default_value_t = CadenceArg::Daily)]
        cadence: CadenceArg,
    },
    /// Check in on a habit
    Check {
        /// Habit ID or unique ID prefix
        id: String,
        /// Day to check in (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        on: Option<NaiveDate>,
    },
    /// List habits with their streaks
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum CalendarCommands {
    /// Import calendar events as tasks
    Import {
        /// Access token (defaults to the stored calendar token)
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Calendar API base URL (defaults to calendar_api_base from config)
        #[arg(long, value_name = "URL")]
        api_base: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CadenceArg {
    Daily,
    Weekly,
}

impl From<CadenceArg> for Cadence {
    fn from(value: CadenceArg) -> Self {
        match value {
            CadenceArg::Daily => Self::Daily,
            CadenceArg::Weekly => Self::Weekly,
        }
    }
}
