//! Engine configuration.
//!
//! `EngineConfig` is read from an optional JSON file and then adjusted by
//! `TEND_*` environment variables. Every field has a default, so an empty
//! file (or no file) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::calendar::CalendarWindow;
use crate::error::{Error, Result};
use crate::sync::EchoSuppression;
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_DATA_DIR: &str = "TEND_DATA_DIR";
pub const ENV_ECHO_SUPPRESSION: &str = "TEND_ECHO_SUPPRESSION";
pub const ENV_ECHO_WINDOW_MS: &str = "TEND_ECHO_WINDOW_MS";
pub const ENV_CALENDAR_API_BASE: &str = "TEND_CALENDAR_API_BASE";
pub const ENV_CLIENT_ID: &str = "TEND_CLIENT_ID";

const DEFAULT_ECHO_WINDOW_MS: u64 = 1000;
const DATABASE_FILE_NAME: &str = "tend.db";

/// How self-echoes of remote writes are recognised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EchoMode {
    /// Skip pushes for a fixed window after committing a remote update
    #[default]
    Window,
    /// Skip pushes tagged with a revision this client wrote
    Revision,
}

impl std::str::FromStr for EchoMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "window" => Ok(Self::Window),
            "revision" => Ok(Self::Revision),
            other => Err(Error::InvalidInput(format!(
                "unknown echo suppression mode '{other}' (expected window or revision)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory holding the local database
    pub data_dir: Option<PathBuf>,
    /// Fixed client id; generated and persisted locally when unset
    pub client_id: Option<String>,
    pub echo_suppression: EchoMode,
    pub echo_window_ms: u64,
    /// Base URL of the calendar REST API
    pub calendar_api_base: Option<String>,
    pub calendar_lookback_days: u32,
    pub calendar_lookahead_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let window = CalendarWindow::default();
        Self {
            data_dir: None,
            client_id: None,
            echo_suppression: EchoMode::Window,
            echo_window_ms: DEFAULT_ECHO_WINDOW_MS,
            calendar_api_base: None,
            calendar_lookback_days: window.lookback_days,
            calendar_lookahead_days: window.lookahead_days,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults adjusted by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `TEND_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| normalize_text_option(lookup(key));

        if let Some(data_dir) = read(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(data_dir));
        }
        if let Some(mode) = read(ENV_ECHO_SUPPRESSION) {
            self.echo_suppression = mode.parse()?;
        }
        if let Some(window) = read(ENV_ECHO_WINDOW_MS) {
            self.echo_window_ms = window.parse().map_err(|_| {
                Error::InvalidInput(format!(
                    "{ENV_ECHO_WINDOW_MS} must be a whole number of milliseconds"
                ))
            })?;
        }
        if let Some(base) = read(ENV_CALENDAR_API_BASE) {
            self.calendar_api_base = Some(base);
        }
        if let Some(client_id) = read(ENV_CLIENT_ID) {
            self.client_id = Some(client_id);
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(base) = normalize_text_option(self.calendar_api_base.clone()) {
            if !is_http_url(&base) {
                return Err(Error::InvalidInput(
                    "calendar_api_base must include http:// or https://".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub const fn echo_suppression(&self) -> EchoSuppression {
        match self.echo_suppression {
            EchoMode::Window => EchoSuppression::Window(Duration::from_millis(self.echo_window_ms)),
            EchoMode::Revision => EchoSuppression::Revision,
        }
    }

    pub const fn calendar_window(&self) -> CalendarWindow {
        CalendarWindow {
            lookback_days: self.calendar_lookback_days,
            lookahead_days: self.calendar_lookahead_days,
        }
    }

    /// Database path under `data_dir`, if one is configured.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|data_dir| data_dir.join(DATABASE_FILE_NAME))
    }
}
