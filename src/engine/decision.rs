//! Decision engine.
//!
//! One cycle: fetch the inventory, record every scanned bundle, buy the
//! first available bundle if no purchase has happened yet, then send
//! either the urgent "available" alert or a throttled heartbeat.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::guard::{PurchaseAttempt, PurchaseGuard, PurchaseState};
use super::throttle::NotificationThrottle;
use crate::cloud::BundleProvider;
use crate::notify::{Notice, Notifier};
use crate::storage::PurchaseMarker;
use crate::types::{Bundle, BundleReport, CycleReport, ProviderError, PurchaseOutcome};

pub struct DecisionEngine {
    provider: Arc<dyn BundleProvider>,
    notifier: Arc<dyn Notifier>,
    marker: PurchaseMarker,
    guard: PurchaseGuard,
    throttle: Mutex<NotificationThrottle>,
    /// Held for a whole cycle so overlapping cycles run one after another.
    cycle: tokio::sync::Mutex<()>,
}

impl DecisionEngine {
    /// Build the engine. The purchase state starts `Done` when `marker`
    /// already exists.
    pub fn new(
        provider: Arc<dyn BundleProvider>,
        notifier: Arc<dyn Notifier>,
        marker: PurchaseMarker,
        heartbeat_interval: Duration,
    ) -> Self {
        let guard = PurchaseGuard::new(marker.exists());
        if guard.is_done() {
            match marker.read() {
                Ok(Some(at)) => {
                    info!(purchased_at = %at, "Already purchased, automatic purchase disabled")
                }
                Ok(None) => info!("Already purchased, automatic purchase disabled"),
                Err(e) => warn!(
                    error = %format!("{e:#}"),
                    "Purchase marker unreadable, automatic purchase disabled"
                ),
            }
        }
        Self {
            provider,
            notifier,
            marker,
            guard,
            throttle: Mutex::new(NotificationThrottle::new(heartbeat_interval)),
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn purchase_state(&self) -> PurchaseState {
        self.guard.state()
    }

    pub fn last_notified(&self) -> Option<DateTime<Utc>> {
        self.throttle().last_delivered()
    }

    fn throttle(&self) -> std::sync::MutexGuard<'_, NotificationThrottle> {
        self.throttle.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle with an explicit clock.
    ///
    /// `now` is the cycle start. Deliveries are stamped `now` plus the time
    /// the cycle has spent so far. Returns an error only when the inventory
    /// fetch fails; nothing is bought or sent in that case.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let started = Instant::now();
        let _cycle = self.cycle.lock().await;

        let snapshot = self
            .provider
            .fetch_bundles()
            .await
            .context("Inventory fetch failed")?;

        let mut report = BundleReport::default();
        let mut availability_found = false;
        let mut purchase = PurchaseOutcome::NotAttempted;

        for bundle in &snapshot {
            info!(bundle = %bundle.display_key(), state = %bundle.sales_state, "Bundle state");
            report.record(bundle);

            if !bundle.is_available() {
                continue;
            }
            availability_found = true;

            if let Some(attempt) = self.guard.begin() {
                purchase = self.purchase(bundle, attempt, now).await;
                break;
            }
        }

        let heartbeat_due = !availability_found && self.throttle().is_due(now);
        let (notice, notice_delivered) = if availability_found {
            let notice = Notice::available(&report, now);
            (Some(notice.kind), self.deliver(&notice, now, started).await)
        } else if heartbeat_due {
            let notice = Notice::heartbeat(&report, now);
            (Some(notice.kind), self.deliver(&notice, now, started).await)
        } else {
            debug!("Heartbeat not due");
            (None, false)
        };

        Ok(CycleReport {
            timestamp: now,
            bundles_seen: snapshot.len(),
            availability_found,
            report,
            purchase,
            notice,
            notice_delivered,
        })
    }

    /// Purchase `bundle` under `attempt`. Dropping this future mid-call
    /// drops the attempt, which puts the guard back to `Idle`.
    async fn purchase(
        &self,
        bundle: &Bundle,
        attempt: PurchaseAttempt<'_>,
        now: DateTime<Utc>,
    ) -> PurchaseOutcome {
        info!(bundle_id = %bundle.id, bundle = %bundle.display_key(), "Bundle available, purchasing");

        match self.provider.create_instance(&bundle.id).await {
            Ok(instance_ids) => {
                attempt.succeed();
                info!(bundle_id = %bundle.id, instances = ?instance_ids, "Purchase succeeded");

                // The purchase already happened; a missing marker only
                // matters after a restart.
                if let Err(e) = self.marker.write(now) {
                    error!(error = %format!("{e:#}"), "Failed to write purchase marker");
                }

                let notice = Notice::purchased(&bundle.display_key(), &instance_ids, now);
                if let Err(e) = self.notifier.send(&notice).await {
                    warn!(error = %format!("{e:#}"), "Purchase notification failed");
                }

                PurchaseOutcome::Succeeded {
                    bundle_id: bundle.id.clone(),
                    instance_ids,
                }
            }
            Err(e) => {
                attempt.fail();
                match &e {
                    ProviderError::Api {
                        code,
                        message,
                        request_id,
                    } => warn!(
                        bundle_id = %bundle.id,
                        code = %code,
                        message = %message,
                        request_id = %request_id,
                        "CreateInstances rejected, will retry next cycle"
                    ),
                    other => warn!(
                        bundle_id = %bundle.id,
                        error = %other,
                        "Purchase attempt failed, will retry next cycle"
                    ),
                }
                PurchaseOutcome::Failed {
                    bundle_id: bundle.id.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Send a status notice; advance the throttle only on delivery, stamped
    /// with the moment the webhook answered.
    async fn deliver(&self, notice: &Notice, now: DateTime<Utc>, started: Instant) -> bool {
        match self.notifier.send(notice).await {
            Ok(()) => {
                let elapsed =
                    Duration::from_std(started.elapsed()).unwrap_or_else(|_| Duration::zero());
                self.throttle().record_delivery(now + elapsed);
                true
            }
            Err(e) => {
                warn!(kind = %notice.kind, error = %format!("{e:#}"), "Notification not delivered");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
