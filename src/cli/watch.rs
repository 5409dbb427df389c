//! Watch command - sync on an interval until interrupted.

use std::sync::Arc;

use tracing::info;

use crate::cli::{output, GlobalArgs};
use crate::core::context::{RuntimeContext, SyncOptions};
use crate::core::watcher::Watcher;
use crate::error::Result;

/// Run the watcher on a current-thread runtime until SIGINT/SIGTERM.
pub fn execute(global: &GlobalArgs, app: Option<String>) -> Result<()> {
    let ctx = RuntimeContext::build(global.runtime_options(app, SyncOptions::default()))?;
    let interval = ctx.config.interval()?;
    let engine = Arc::new(super::engine(&ctx.config)?);

    info!(interval = ?interval, "starting watcher");
    output::status(&format!("watching every {:?}, ctrl-c to stop", interval));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let watcher = Watcher::new(engine, interval);
    runtime.block_on(watcher.run(ctx));

    output::status("stopped");
    Ok(())
}
