//! Periodic sync loop.
//!
//! Runs a cycle immediately, then once per interval: refresh every cached
//! source, then sync every app in scope. Failures are logged and retried on
//! the next tick. On shutdown an in-flight cycle is allowed to finish; the
//! shared [`CancelToken`] stops it before the next app.
//!
//! State transitions are published on a `watch` channel:
//! `Idle -> Running -> Idle -> ... -> ShuttingDown -> Stopped`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::core::cipher::{Age, Cipher, Identity};
use crate::core::context::RuntimeContext;
use crate::core::sync::{CancelToken, SyncEngine};

/// Lifecycle of a [`Watcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Waiting for the next tick
    Idle,
    /// A sync cycle is in progress (1-based)
    Running { cycle: u64 },
    /// Shutdown requested; finishing the current cycle
    ShuttingDown,
    /// Loop has exited
    Stopped,
}

/// Drives a [`SyncEngine`] on a fixed interval.
pub struct Watcher<C: Cipher = Age> {
    engine: Arc<SyncEngine<C>>,
    interval: Duration,
    cancel: CancelToken,
    state: watch::Sender<WatcherState>,
}

impl<C> Watcher<C>
where
    C: Cipher<Identity = Identity> + 'static,
{
    pub fn new(engine: Arc<SyncEngine<C>>, interval: Duration) -> Self {
        let (state, _) = watch::channel(WatcherState::Idle);
        Self {
            engine,
            interval,
            cancel: CancelToken::new(),
            state,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    /// Token tripped on shutdown; cancelling it directly stops the current
    /// cycle between apps without stopping the loop.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run until SIGINT or SIGTERM.
    pub async fn run(&self, ctx: RuntimeContext) {
        self.run_until(ctx, shutdown_signal()).await;
    }

    /// Run until `shutdown` completes.
    pub async fn run_until<F>(&self, ctx: RuntimeContext, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = std::pin::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.interval, "watcher started");
        let mut ctx = ctx;
        let mut cycle = 0u64;

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    self.begin_shutdown();
                    break;
                }
                _ = ticker.tick() => {}
            }

            cycle += 1;
            self.state.send_replace(WatcherState::Running { cycle });

            let engine = Arc::clone(&self.engine);
            let cancel = self.cancel.clone();
            let mut task = tokio::task::spawn_blocking(move || {
                run_cycle(&engine, &mut ctx, &cancel, cycle);
                ctx
            });

            let (joined, stopping) = tokio::select! {
                joined = &mut task => (joined, false),
                () = &mut shutdown => {
                    info!(cycle, "shutdown requested, finishing current cycle");
                    self.begin_shutdown();
                    (task.await, true)
                }
            };

            match joined {
                Ok(returned) => ctx = returned,
                Err(e) => {
                    error!(cycle, error = %e, "sync cycle aborted");
                    break;
                }
            }

            if stopping {
                break;
            }
            self.state.send_replace(WatcherState::Idle);
        }

        self.state.send_replace(WatcherState::Stopped);
        info!(cycles = cycle, "watcher stopped");
    }

    fn begin_shutdown(&self) {
        self.cancel.cancel();
        self.state.send_replace(WatcherState::ShuttingDown);
    }
}

fn run_cycle<C>(engine: &SyncEngine<C>, ctx: &mut RuntimeContext, cancel: &CancelToken, cycle: u64)
where
    C: Cipher<Identity = Identity>,
{
    info!(cycle, "sync cycle starting");

    if let Err(e) = engine.cache().refresh() {
        warn!(cycle, error = %e, "source refresh failed");
    }

    let summary = engine.sync_each(ctx, cancel);
    let written: usize = summary.reports.iter().map(|r| r.written()).sum();
    let failed = summary.failures.len();
    let cancelled = summary.cancelled;

    if let Err(e) = summary.into_result() {
        warn!(cycle, error = %e, "sync cycle had failures");
    }
    info!(cycle, written, failed, cancelled, "sync cycle finished");
}

/// Completes on ctrl-c, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received interrupt"),
        () = terminate => info!("received terminate"),
    }
}
