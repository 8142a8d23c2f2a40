//! Tend CLI - tasks, habits and money from the terminal
//!
//! Works against the same local store the sync engine hydrates, so anything
//! recorded here is merged into the cloud copy on the next signed-in session.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{CalendarCommands, Cli, Commands, HabitCommands, TaskCommands};
use crate::commands::calendar::run_calendar_import;
use crate::commands::common::{load_config, resolve_db_path, AppState};
use crate::commands::export::run_export;
use crate::commands::habit::{run_habit_add, run_habit_check, run_habit_list};
use crate::commands::reconcile::run_reconcile;
use crate::commands::spend::run_spend;
use crate::commands::status::run_status;
use crate::commands::task::{run_task_add, run_task_done, run_task_list, run_task_remove};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tend=info,tend_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let db_path = resolve_db_path(cli.db_path, &config)?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let app = AppState::open(&db_path, config)?;

    match cli.command {
        Commands::Task { command } => match command {
            TaskCommands::Add { title, list, due } => {
                run_task_add(&app, &title, list.as_deref(), due.as_deref())?;
            }
            TaskCommands::List { all, json } => run_task_list(&app, all, json)?,
            TaskCommands::Done { id } => run_task_done(&app, &id)?,
            TaskCommands::Remove { id, hard } => run_task_remove(&app, &id, hard)?,
        },
        Commands::Habit { command } => match command {
            HabitCommands::Add { name, cadence } => run_habit_add(&app, &name, cadence.into())?,
            HabitCommands::Check { id, on } => run_habit_check(&app, &id, on)?,
            HabitCommands::List { json } => run_habit_list(&app, json)?,
        },
        Commands::Spend {
            amount,
            category,
            income,
            note,
        } => run_spend(&app, amount, &category, income, note)?,
        Commands::Export { output } => run_export(&app, output.as_deref())?,
        Commands::Reconcile { path, json } => run_reconcile(&app, &path, json)?,
        Commands::Status { json } => run_status(&app, json)?,
        Commands::Calendar { command } => match command {
            CalendarCommands::Import { token, api_base } => {
                run_calendar_import(&app, token, api_base).await?;
            }
        },
    }

    Ok(())
}
