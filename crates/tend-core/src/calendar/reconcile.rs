//! Mirror fetched calendar events into the task store.

use std::collections::HashMap;

use serde::Serialize;

use super::CalendarEvent;
use crate::models::Task;
use crate::store::DomainStore;

/// Counts from one calendar import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CalendarImport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl CalendarImport {
    pub const fn imported(&self) -> usize {
        self.created + self.updated
    }
}

/// Work out which tasks to write for `events`.
///
/// A task already tracking an event (same `externalId`) keeps its local id,
/// completion state and list; only the event-owned fields are refreshed.
/// Soft-deleted tracked tasks are left alone.
pub fn plan_event_changes(
    existing: &[Task],
    events: &[CalendarEvent],
) -> (Vec<Task>, CalendarImport) {
    let tracked: HashMap<&str, &Task> = existing
        .iter()
        .filter_map(|task| task.external_id.as_deref().map(|external| (external, task)))
        .collect();

    let mut changes = Vec::new();
    let mut import = CalendarImport::default();

    for event in events {
        match tracked.get(event.id.as_str()) {
            Some(task) if task.is_deleted => import.unchanged += 1,
            Some(task) => {
                let mut refreshed = (*task).clone();
                refreshed.title.clone_from(&event.title);
                refreshed.notes.clone_from(&event.description);
                refreshed.due_at = Some(event.start);
                if refreshed == **task {
                    import.unchanged += 1;
                } else {
                    changes.push(refreshed);
                    import.updated += 1;
                }
            }
            None => {
                let mut task = Task::new(event.title.clone());
                task.notes.clone_from(&event.description);
                task.due_at = Some(event.start);
                task.external_id = Some(event.id.clone());
                changes.push(task);
                import.created += 1;
            }
        }
    }

    (changes, import)
}

/// Apply `events` to the task store through the normal mutation path.
pub fn reconcile_events(tasks: &DomainStore<Task>, events: &[CalendarEvent]) -> CalendarImport {
    let (changes, import) = plan_event_changes(&tasks.get_all(), events);
    for task in changes {
        tasks.mutate(task);
    }
    tracing::info!(
        "Calendar import: {} created, {} updated, {} unchanged",
        import.created,
        import.updated,
        import.unchanged
    );
    import
}
