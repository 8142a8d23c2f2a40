use chrono::Utc;
use tend_core::auth::SessionVault;
use tend_core::calendar::{
    reconcile_events, CalendarBridge, CalendarError, CalendarImport, HttpCalendarClient,
};
use tend_core::util::normalize_text_option;

use crate::commands::common::AppState;
use crate::error::CliError;

/// Explicit flag first, then the stored session token.
pub fn resolve_calendar_token(
    explicit: Option<String>,
    vault: &SessionVault,
) -> Result<String, CliError> {
    normalize_text_option(explicit)
        .or_else(|| vault.calendar_token())
        .ok_or(CliError::MissingCalendarToken)
}

pub fn resolve_api_base(explicit: Option<String>, app: &AppState) -> Result<String, CliError> {
    normalize_text_option(explicit)
        .or_else(|| normalize_text_option(app.config.calendar_api_base.clone()))
        .ok_or_else(|| {
            CliError::Config(
                "no calendar API base; pass --api-base or set TEND_CALENDAR_API_BASE".to_string(),
            )
        })
}

/// Fetch the configured window from `bridge` and fold it into the task store.
pub async fn import_with<C: CalendarBridge>(
    app: &AppState,
    bridge: &C,
    token: &str,
    vault: &SessionVault,
) -> Result<CalendarImport, CliError> {
    let (range_start, range_end) = app.config.calendar_window().range_around(Utc::now());
    match bridge.fetch_events(token, range_start, range_end).await {
        Ok(events) => Ok(reconcile_events(&app.stores.tasks, &events)),
        Err(CalendarError::TokenExpired) => {
            tracing::warn!("Calendar token expired; clearing it");
            vault.clear_calendar_token();
            Err(CalendarError::TokenExpired.into())
        }
        Err(error) => Err(error.into()),
    }
}

pub async fn run_calendar_import(
    app: &AppState,
    token: Option<String>,
    api_base: Option<String>,
) -> Result<(), CliError> {
    let vault = SessionVault::new(app.local.clone());
    let token = resolve_calendar_token(token, &vault)?;
    let client = HttpCalendarClient::new(resolve_api_base(api_base, app)?)?;

    let import = import_with(app, &client, &token, &vault).await?;
    println!(
        "Imported {} events ({} new, {} updated, {} unchanged)",
        import.imported(),
        import.created,
        import.updated,
        import.unchanged
    );
    Ok(())
}
