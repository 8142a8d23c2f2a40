//! Focus timer session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::record::{impl_sync_record, Domain};
use super::timestamp::deserialize_lenient;
use crate::util::new_record_id;

/// One focus-timer run. A completed session grows a tree in the forest view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub completed: bool,
    /// Tree species planted for this session
    #[serde(default = "default_tree")]
    pub tree: String,
    /// Task worked on during the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(FocusSession, Domain::FocusSessions);

fn default_tree() -> String {
    "oak".to_string()
}

impl FocusSession {
    #[must_use]
    pub fn start(duration_minutes: u32) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            started_at: now,
            duration_minutes,
            completed: false,
            tree: default_tree(),
            task_id: None,
            updated_at: Some(now),
        }
    }

    /// Planned end of the session.
    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::minutes(i64::from(self.duration_minutes))
    }
}
