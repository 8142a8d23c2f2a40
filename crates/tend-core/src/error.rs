//! Error types for tend-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::calendar::CalendarError;
use crate::remote::RemoteError;

/// Result type alias using tend-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tend-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error from the durable key/value backend
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote document store error
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Sign-in / sign-out error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Calendar bridge error
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}
