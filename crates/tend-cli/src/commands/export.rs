use std::fs;
use std::path::Path;

use crate::commands::common::AppState;
use crate::error::CliError;

pub fn render_export(app: &AppState) -> Result<String, CliError> {
    let document = app.stores.to_document()?;
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn run_export(app: &AppState, output: Option<&Path>) -> Result<(), CliError> {
    let rendered = render_export(app)?;

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, rendered)?;
        println!("Exported to {}", path.display());
    } else {
        println!("{rendered}");
    }
    Ok(())
}
