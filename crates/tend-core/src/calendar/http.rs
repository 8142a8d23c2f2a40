//! REST calendar client

use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{CalendarBridge, CalendarError, CalendarEvent, CalendarResult};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const CALENDAR_HTTP_TIMEOUT_SECS: u64 = 15;
const MAX_PAGES: usize = 20;

/// Fetches events from a Google-Calendar-style REST API.
#[derive(Clone)]
pub struct HttpCalendarClient {
    events_endpoint: String,
    client: reqwest::Client,
}

impl HttpCalendarClient {
    pub fn new(api_base: impl Into<String>) -> CalendarResult<Self> {
        let base = normalize_base(api_base.into())?;
        Ok(Self {
            events_endpoint: format!("{base}/calendars/primary/events"),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(CALENDAR_HTTP_TIMEOUT_SECS))
                .build()?,
        })
    }

    async fn fetch_page(
        &self,
        token: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> CalendarResult<EventsPage> {
        let mut query = vec![
            ("timeMin", rfc3339(range_start)),
            ("timeMax", rfc3339(range_end)),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token.to_string()));
        }

        let response = self
            .client
            .get(&self.events_endpoint)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CalendarError::TokenExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        parse_events_page(&body)
    }
}

impl CalendarBridge for HttpCalendarClient {
    async fn fetch_events(
        &self,
        token: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CalendarError::TokenExpired);
        }

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page = self
                .fetch_page(token, range_start, range_end, page_token.as_deref())
                .await?;
            events.extend(page.events);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => return Ok(events),
            }
        }

        tracing::warn!(
            "Calendar returned more than {} pages; keeping the first {} events",
            MAX_PAGES,
            events.len()
        );
        Ok(events)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct EventsPage {
    events: Vec<CalendarEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    #[serde(default)]
    items: Vec<EventResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResource {
    id: Option<String>,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date: Option<NaiveDate>,
    date_time: Option<DateTime<Utc>>,
}

impl EventTime {
    /// Instant plus whether it came from an all-day `date`.
    fn resolve(&self) -> Option<(DateTime<Utc>, bool)> {
        if let Some(date_time) = self.date_time {
            return Some((date_time, false));
        }
        self.date
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| (midnight.and_utc(), true))
    }
}

fn parse_events_page(body: &str) -> CalendarResult<EventsPage> {
    let response: EventsResponse = serde_json::from_str(body)
        .map_err(|error| CalendarError::InvalidPayload(error.to_string()))?;

    let events = response
        .items
        .into_iter()
        .filter_map(|resource| {
            if resource.status.as_deref() == Some("cancelled") {
                return None;
            }
            let id = normalize_text_option(resource.id)?;
            let Some((start, all_day)) = resource.start.as_ref().and_then(EventTime::resolve)
            else {
                tracing::warn!("Skipping calendar event {} without a start time", id);
                return None;
            };
            Some(CalendarEvent {
                id,
                title: normalize_text_option(resource.summary)
                    .unwrap_or_else(|| "(untitled event)".to_string()),
                description: normalize_text_option(resource.description),
                start,
                end: resource
                    .end
                    .as_ref()
                    .and_then(EventTime::resolve)
                    .map(|(end, _)| end),
                all_day,
            })
        })
        .collect();

    Ok(EventsPage {
        events,
        next_page_token: normalize_text_option(response.next_page_token),
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorDetail {
    Message(String),
    Object { message: Option<String> },
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        let detail = match payload.error {
            Some(ApiErrorDetail::Message(message)) => Some(message),
            Some(ApiErrorDetail::Object { message }) => message,
            None => None,
        };
        if let Some(message) = detail.or(payload.message) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base(raw: String) -> CalendarResult<String> {
    let base = normalize_text_option(Some(raw)).ok_or_else(|| {
        CalendarError::Api("calendar API base URL must not be empty".to_string())
    })?;
    if is_http_url(&base) {
        Ok(base.trim_end_matches('/').to_string())
    } else {
        Err(CalendarError::Api(
            "calendar API base URL must include http:// or https://".to_string(),
        ))
    }
}

fn rfc3339(stamp: DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
