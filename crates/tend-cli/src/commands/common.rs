use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tend_core::config::EngineConfig;
use tend_core::models::{Habit, Task};
use tend_core::storage::{LocalStore, SqliteBackend};
use tend_core::sync::SyncContext;
use tend_core::util::normalize_text_option;
use tend_core::{DomainStore, Stores, SyncRecord};

use crate::error::CliError;

/// Local stores opened for one CLI invocation.
///
/// The CLI never signs in, so writes land in local persistence only.
pub struct AppState {
    pub config: EngineConfig,
    pub local: LocalStore,
    pub context: Arc<SyncContext>,
    pub stores: Stores,
}

impl AppState {
    pub fn open(db_path: &Path, config: EngineConfig) -> Result<Self, CliError> {
        let local = LocalStore::new(SqliteBackend::open(db_path)?);
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| local.client_id());
        let context = Arc::new(SyncContext::new(client_id, config.echo_suppression()));
        let stores = Stores::new(&local, &context);
        stores.load_from_local();
        Ok(Self {
            config,
            local,
            context,
            stores,
        })
    }
}

/// Config file (if any) plus `TEND_*` environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    let mut config = match path {
        Some(path) => EngineConfig::load_from_path(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("tend").join("tend.db"))
        .ok_or_else(|| CliError::Config("failed to resolve a data directory".to_string()))
}

/// `--db-path`, then the configured data dir, then the platform default.
pub fn resolve_db_path(
    explicit: Option<PathBuf>,
    config: &EngineConfig,
) -> Result<PathBuf, CliError> {
    match explicit.or_else(|| config.database_path()) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn normalize_title(parts: &[String]) -> Option<String> {
    normalize_text_option(Some(parts.join(" ")))
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Find a record by exact id or unique id prefix.
pub fn resolve_record<R: SyncRecord>(store: &DomainStore<R>, query: &str) -> Result<R, CliError> {
    let query = normalize_identifier(query)?;
    if let Some(record) = store.get(&query) {
        return Ok(record);
    }

    let mut matches: Vec<R> = store
        .get_all()
        .into_iter()
        .filter(|record| record.id().starts_with(&query))
        .collect();

    match matches.len() {
        0 => Err(CliError::NotFound {
            domain: store.domain().to_string(),
            query,
        }),
        1 => Ok(matches.remove(0)),
        count => {
            let options = matches
                .iter()
                .take(3)
                .map(|record| record.id().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let suffix = if count > 3 { ", ..." } else { "" };
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}{suffix}"
            )))
        }
    }
}

/// Accept a calendar date (local midnight) or a full RFC 3339 timestamp.
pub fn parse_due(raw: &str) -> Result<DateTime<Utc>, CliError> {
    let trimmed = raw.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(stamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| CliError::InvalidDate(trimmed.to_string()))
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn format_task_lines(tasks: &[Task]) -> Vec<String> {
    tasks
        .iter()
        .map(|task| {
            let mark = if task.completed { "x" } else { " " };
            let due = task
                .due_at
                .map(|due| {
                    format!(
                        "  (due {})",
                        due.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                    )
                })
                .unwrap_or_default();
            format!("[{mark}] {}  {}{due}", short_id(&task.id), task.title)
        })
        .collect()
}

pub fn format_habit_lines(habits: &[Habit], today: NaiveDate) -> Vec<String> {
    habits
        .iter()
        .map(|habit| {
            let mark = if habit.is_done_on(today) { "x" } else { " " };
            format!(
                "[{mark}] {}  {}  streak {}",
                short_id(&habit.id),
                habit.name,
                habit.streak(today)
            )
        })
        .collect()
}

/// Open tasks first, then by due date (undated last), then by creation.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|left, right| {
        left.completed
            .cmp(&right.completed)
            .then_with(|| match (left.due_at, right.due_at) {
                (Some(left_due), Some(right_due)) => left_due.cmp(&right_due),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| left.created_at.cmp(&right.created_at))
    });
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
