//! Calendar bridge contract and event-to-task reconciliation.

mod http;
mod reconcile;

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpCalendarClient;
pub use reconcile::{plan_event_changes, reconcile_events, CalendarImport};

/// One event fetched from the user's calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Provider event id, stored on the mirrored task as `externalId`
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: bool,
}

#[derive(Debug, Error)]
pub enum CalendarError {
    /// The provider answered 401; the caller must re-authenticate.
    #[error("Calendar access token expired")]
    TokenExpired,
    #[error("Calendar HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Calendar API error: {0}")]
    Api(String),
    #[error("Invalid calendar payload: {0}")]
    InvalidPayload(String),
}

pub type CalendarResult<T> = Result<T, CalendarError>;

/// Source of calendar events for a signed-in user.
pub trait CalendarBridge: Clone + Send + Sync + 'static {
    fn fetch_events(
        &self,
        token: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> impl Future<Output = CalendarResult<Vec<CalendarEvent>>> + Send;
}

/// Bridge used when no calendar integration is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCalendar;

impl CalendarBridge for NoCalendar {
    async fn fetch_events(
        &self,
        _token: &str,
        _range_start: DateTime<Utc>,
        _range_end: DateTime<Utc>,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        Ok(Vec::new())
    }
}

/// Days around "now" that a calendar import covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarWindow {
    pub lookback_days: u32,
    pub lookahead_days: u32,
}

impl Default for CalendarWindow {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            lookahead_days: 30,
        }
    }
}

impl CalendarWindow {
    pub fn range_around(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            now - Duration::days(i64::from(self.lookback_days)),
            now + Duration::days(i64::from(self.lookahead_days)),
        )
    }
}
