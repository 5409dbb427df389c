//! Validate command - check every mapped file exists without decrypting.

use tracing::info;

use crate::cli::{output, GlobalArgs};
use crate::core::config::Config;
use crate::error::{Result, SyncError};

/// Fetch each app's tree and look up its files.
pub fn execute(global: &GlobalArgs, app: Option<String>) -> Result<()> {
    info!(config = %global.config.display(), "validating");

    let config = Config::load(&global.config)?;
    let apps = match app {
        Some(app) => {
            config.app(&app)?;
            vec![app]
        }
        None => config.app_names(),
    };

    let engine = super::engine(&config)?;
    let report = engine.validate(&config, &apps);

    if report.is_ok() {
        output::success(&format!(
            "config valid ({} apps, {} files found)",
            apps.len(),
            report.checked
        ));
        return Ok(());
    }

    let mut failures = Vec::new();
    for (app, path) in report.missing {
        output::list_item(&format!("{}: {} missing", app, path));
        failures.push((app.clone(), SyncError::FileNotFound { app, path }.into()));
    }
    for (app, err) in report.failures {
        output::list_item(&format!("{}: {}", app, err));
        failures.push((app, err));
    }

    Err(SyncError::Apps { failures }.into())
}
