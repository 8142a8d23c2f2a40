use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tend_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No title provided")]
    EmptyTitle,
    #[error("Record ID cannot be empty")]
    EmptyId,
    #[error("No {domain} record found for id/prefix: {query}")]
    NotFound { domain: String, query: String },
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Category cannot be empty")]
    EmptyCategory,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid date '{0}': expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No calendar access token. Pass --token or sign in with calendar access.")]
    MissingCalendarToken,
    #[error("Calendar error: {0}")]
    Calendar(#[from] tend_core::calendar::CalendarError),
}
