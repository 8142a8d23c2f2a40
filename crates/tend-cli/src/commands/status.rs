use serde::Serialize;
use tend_core::auth::{AuthUser, SessionVault};
use tend_core::config::EchoMode;

use crate::commands::common::AppState;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStatus {
    pub user: Option<AuthUser>,
    pub calendar_connected: bool,
    pub client_id: String,
    pub echo_suppression: EchoMode,
    pub counts: Vec<DomainCount>,
}

#[derive(Debug, Serialize)]
pub struct DomainCount {
    pub domain: String,
    pub records: usize,
}

pub fn collect_status(app: &AppState) -> LocalStatus {
    let session = SessionVault::new(app.local.clone()).load();
    LocalStatus {
        calendar_connected: session
            .as_ref()
            .is_some_and(|session| session.calendar_token.is_some()),
        user: session.map(|session| session.user),
        client_id: app.context.client_id().to_string(),
        echo_suppression: app.config.echo_suppression,
        counts: app
            .stores
            .counts()
            .into_iter()
            .map(|(domain, records)| DomainCount {
                domain: domain.to_string(),
                records,
            })
            .collect(),
    }
}

pub fn run_status(app: &AppState, json: bool) -> Result<(), CliError> {
    let status = collect_status(app);

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match &status.user {
        Some(user) => println!(
            "Signed in as {}",
            user.email.as_deref().unwrap_or(user.id.as_str())
        ),
        None => println!("Signed out"),
    }
    println!(
        "Calendar: {}",
        if status.calendar_connected {
            "connected"
        } else {
            "not connected"
        }
    );
    println!("Client: {}", status.client_id);
    for count in &status.counts {
        println!("{:<14} {}", count.domain, count.records);
    }
    Ok(())
}
