//! Shared sync state types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::AuthUser;

/// Coarse sync state shown to the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Offline,
    Syncing,
    Synced,
    Error,
}

/// Where the orchestrator is in the session lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    #[default]
    SignedOut,
    Authenticating,
    Hydrating,
    Subscribed,
}

/// Outcome of the most recent calendar import.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum CalendarStatus {
    #[default]
    Idle,
    Synced {
        at: DateTime<Utc>,
        imported: usize,
    },
    /// The calendar token was rejected; the user needs to sign in again.
    TokenExpired,
    Failed {
        message: String,
    },
}

/// Snapshot published on every sync state change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    pub phase: SessionPhase,
    pub user: Option<AuthUser>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub calendar: CalendarStatus,
}

impl SyncStatus {
    /// True when the calendar bridge needs a fresh token.
    pub const fn needs_reauthentication(&self) -> bool {
        matches!(self.calendar, CalendarStatus::TokenExpired)
    }
}
