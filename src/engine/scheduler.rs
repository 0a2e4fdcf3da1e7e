//! Fixed-period scheduler and shutdown wiring.
//!
//! The first cycle runs one period after start, not immediately. Cycle
//! errors are logged and never stop the loop; only the shutdown signal
//! does. A cycle in progress finishes before shutdown is observed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::decision::DecisionEngine;

/// Receiving half of the shutdown signal; `true` means stop.
pub type ShutdownSignal = watch::Receiver<bool>;

pub fn shutdown_channel() -> (watch::Sender<bool>, ShutdownSignal) {
    watch::channel(false)
}

/// Flip `tx` to `true` on SIGINT or SIGTERM.
pub fn spawn_signal_listener(tx: watch::Sender<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("Shutdown signal received.");
        let _ = tx.send(true);
    })
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Cannot listen for SIGTERM, Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}

pub struct Scheduler {
    engine: Arc<DecisionEngine>,
    period: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<DecisionEngine>, period: Duration) -> Self {
        Self { engine, period }
    }

    /// Run cycles until `shutdown` turns `true` (or its sender is
    /// dropped). Returns the number of cycles started.
    pub async fn run(&self, mut shutdown: ShutdownSignal) -> u64 {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycles: u64 = 0;

        info!(interval_secs = self.period.as_secs(), "Entering main loop");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    cycles += 1;
                    match self.engine.run_cycle().await {
                        Ok(report) => info!(cycle = cycles, %report, "Cycle complete"),
                        Err(e) => warn!(
                            cycle = cycles,
                            error = %format!("{e:#}"),
                            "Cycle aborted, continuing to next"
                        ),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown sender dropped, stopping");
                        break;
                    }
                }
            }
        }

        info!(cycles, "Main loop stopped");
        cycles
    }
}
