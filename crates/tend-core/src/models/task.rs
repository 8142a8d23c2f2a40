//! Task and task list models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{impl_sync_record, Domain};
use super::timestamp::deserialize_lenient;
use crate::util::new_record_id;

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Owning list, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    /// Identifier of the calendar event this task mirrors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Soft delete flag for sync
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Task, Domain::Tasks);

impl Task {
    /// Create a new open task with the given title
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            title: title.into(),
            notes: None,
            list_id: None,
            due_at: None,
            completed: false,
            completed_at: None,
            priority: Priority::Normal,
            external_id: None,
            is_deleted: false,
            created_at: now,
            updated_at: Some(now),
        }
    }

    /// Toggle completion, keeping `completed_at` consistent.
    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
        self.completed_at = completed.then(Utc::now);
    }

    /// Whether the task should be shown in active views.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !self.completed && !self.is_deleted
    }
}

/// A named list grouping tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(TaskList, Domain::Lists);

impl TaskList {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            name: name.into(),
            color: None,
            is_archived: false,
            created_at: now,
            updated_at: Some(now),
        }
    }
}
