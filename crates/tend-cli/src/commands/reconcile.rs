use std::fs;
use std::path::Path;

use tend_core::remote::UserDocument;
use tend_core::sync::{DomainOutcome, DomainReport};

use crate::commands::common::AppState;
use crate::error::CliError;

/// Merge a user document from disk into the local stores.
pub fn reconcile_file(app: &AppState, path: &Path) -> Result<Vec<DomainReport>, CliError> {
    let raw = fs::read_to_string(path)?;
    let document: UserDocument = serde_json::from_str(&raw)?;
    let reports = app.stores.reconcile_document(&document);
    tracing::info!(
        "Reconciled {} against local data ({} domains changed)",
        path.display(),
        reports.iter().filter(|report| report.changed_local()).count()
    );
    Ok(reports)
}

pub fn format_report_line(report: &DomainReport) -> Option<String> {
    match &report.outcome {
        DomainOutcome::Absent => None,
        DomainOutcome::Skipped { reason } => {
            Some(format!("{:<14} skipped: {reason}", report.domain))
        }
        DomainOutcome::Merged {
            inserted,
            replaced,
            conflicts,
            dropped_records,
            ..
        } => {
            let unreadable = if *dropped_records > 0 {
                format!(", {dropped_records} unreadable")
            } else {
                String::new()
            };
            Some(format!(
                "{:<14} +{inserted} ~{replaced} ({} conflicts{unreadable})",
                report.domain,
                conflicts.len()
            ))
        }
    }
}

pub fn run_reconcile(app: &AppState, path: &Path, json: bool) -> Result<(), CliError> {
    let reports = reconcile_file(app, path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let lines: Vec<String> = reports.iter().filter_map(format_report_line).collect();
    if lines.is_empty() {
        println!("Nothing to reconcile.");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
