//! Export command - decrypt apps to their destinations.

use tracing::info;

use crate::cli::{output, GlobalArgs};
use crate::core::context::{RuntimeContext, SyncOptions};
use crate::core::sync::{AppReport, CancelToken, FileOutcome};
use crate::error::Result;

/// Sync one app, or every configured app.
pub fn execute(global: &GlobalArgs, app: Option<String>, options: SyncOptions) -> Result<()> {
    info!(app = ?app, force = options.force, dry_run = options.dry_run, "running export");

    let mut ctx = RuntimeContext::build(global.runtime_options(app, options))?;
    let engine = super::engine(&ctx.config)?;

    if let Some(app) = ctx.app.clone() {
        let report = engine.sync_app(&mut ctx, &app)?;
        print_report(&report, options.dry_run);
        return Ok(());
    }

    let summary = engine.sync_each(&mut ctx, &CancelToken::new());
    for report in &summary.reports {
        print_report(report, options.dry_run);
    }
    summary.into_result().map(|_| ())
}

fn print_report(report: &AppReport, dry_run: bool) {
    for file in &report.files {
        let label = format!("{}: {}", report.app, file.path);
        match &file.outcome {
            FileOutcome::Written { destination } => {
                output::success(&format!("{} → {}", label, output::path(destination.display())));
            }
            FileOutcome::UpToDate => output::dimmed(&format!("{} up to date", label)),
            FileOutcome::DryRun => output::status(&format!("{} (dry run, not written)", label)),
            FileOutcome::DecryptFailed { reason } => {
                let msg = format!("{} failed to decrypt: {}", label, reason);
                if dry_run {
                    output::status(&msg);
                } else {
                    output::warn(&msg);
                }
            }
            FileOutcome::WriteFailed {
                destination,
                reason,
            } => output::warn(&format!(
                "{} failed to write {}: {}",
                label,
                destination.display(),
                reason
            )),
        }
    }
}
