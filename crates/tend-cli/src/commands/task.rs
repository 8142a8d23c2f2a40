use tend_core::models::Task;

use crate::commands::common::{
    format_task_lines, normalize_title, parse_due, resolve_record, short_id, sort_tasks, AppState,
};
use crate::error::CliError;

pub fn run_task_add(
    app: &AppState,
    title_parts: &[String],
    list: Option<&str>,
    due: Option<&str>,
) -> Result<(), CliError> {
    let title = normalize_title(title_parts).ok_or(CliError::EmptyTitle)?;

    let mut task = Task::new(title);
    if let Some(list) = list {
        task.list_id = Some(resolve_record(&app.stores.lists, list)?.id);
    }
    task.due_at = due.map(parse_due).transpose()?;

    let task = app.stores.tasks.mutate(task);
    println!("{}", task.id);
    Ok(())
}

/// Visible tasks, sorted for display.
pub fn list_tasks(app: &AppState, include_completed: bool) -> Vec<Task> {
    let mut tasks: Vec<Task> = app
        .stores
        .tasks
        .get_all()
        .into_iter()
        .filter(|task| !task.is_deleted && (include_completed || !task.completed))
        .collect();
    sort_tasks(&mut tasks);
    tasks
}

pub fn run_task_list(app: &AppState, all: bool, json: bool) -> Result<(), CliError> {
    let tasks = list_tasks(app, all);

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for line in format_task_lines(&tasks) {
        println!("{line}");
    }
    Ok(())
}

pub fn run_task_done(app: &AppState, id: &str) -> Result<(), CliError> {
    let task = resolve_record(&app.stores.tasks, id)?;
    if task.completed {
        println!("Already done: {}", task.title);
        return Ok(());
    }

    let updated = app
        .stores
        .tasks
        .update(&task.id, |task| task.set_completed(true))
        .ok_or_else(|| CliError::NotFound {
            domain: "tasks".to_string(),
            query: task.id.clone(),
        })?;
    println!("Done: {}  {}", short_id(&updated.id), updated.title);
    Ok(())
}

/// Soft delete by default so the removal propagates through merge; `hard`
/// drops the record from the local collection.
pub fn run_task_remove(app: &AppState, id: &str, hard: bool) -> Result<(), CliError> {
    let task = resolve_record(&app.stores.tasks, id)?;

    let removed = if hard {
        app.stores.tasks.remove(&task.id)
    } else {
        app.stores
            .tasks
            .update(&task.id, |task| task.is_deleted = true)
    };

    match removed {
        Some(task) => {
            println!("Removed: {}", short_id(&task.id));
            Ok(())
        }
        None => Err(CliError::NotFound {
            domain: "tasks".to_string(),
            query: task.id,
        }),
    }
}
