//! In-memory collaborators for integration testing.
//!
//! `MockProvider` serves a controllable inventory and records purchase
//! calls; `MockNotifier` records every notice it is asked to deliver.
//! Clones share state so tests can inspect what the engine did.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lhbot::cloud::BundleProvider;
use lhbot::notify::{Notice, Notifier};
use lhbot::storage::PurchaseMarker;
use lhbot::types::{Bundle, BundleSnapshot, NoticeKind, ProviderError, SalesState};

pub fn bundle(id: &str, state: &str) -> Bundle {
    Bundle {
        id: id.to_string(),
        type_description: format!("type-{id}"),
        cpu: 2,
        memory: 2,
        sales_state: SalesState::from(state),
    }
}

pub fn temp_marker() -> PurchaseMarker {
    let mut p = std::env::temp_dir();
    p.push(format!("lhbot_it_marker_{}.lock", uuid::Uuid::new_v4()));
    PurchaseMarker::new(p)
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MockProvider {
    inventory: Arc<Mutex<BundleSnapshot>>,
    fetch_error: Arc<Mutex<Option<String>>>,
    /// Number of upcoming purchase calls that will be rejected.
    purchase_failures: Arc<Mutex<usize>>,
    purchase_delay: Arc<Mutex<Option<Duration>>>,
    purchases: Arc<Mutex<Vec<String>>>,
    fetches: Arc<Mutex<usize>>,
}

impl MockProvider {
    pub fn with_inventory(bundles: BundleSnapshot) -> Self {
        let p = Self::default();
        p.set_inventory(bundles);
        p
    }

    pub fn set_inventory(&self, bundles: BundleSnapshot) {
        *self.inventory.lock().unwrap() = bundles;
    }

    /// Make every fetch fail with a transport error.
    pub fn set_fetch_error(&self, msg: &str) {
        *self.fetch_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_fetch_error(&self) {
        *self.fetch_error.lock().unwrap() = None;
    }

    pub fn fail_next_purchases(&self, n: usize) {
        *self.purchase_failures.lock().unwrap() = n;
    }

    pub fn set_purchase_delay(&self, delay: Duration) {
        *self.purchase_delay.lock().unwrap() = Some(delay);
    }

    pub fn clear_purchase_delay(&self) {
        *self.purchase_delay.lock().unwrap() = None;
    }

    /// Bundle ids passed to `create_instance`, in call order.
    pub fn purchases(&self) -> Vec<String> {
        self.purchases.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl BundleProvider for MockProvider {
    async fn fetch_bundles(&self) -> Result<BundleSnapshot, ProviderError> {
        *self.fetches.lock().unwrap() += 1;
        if let Some(msg) = self.fetch_error.lock().unwrap().clone() {
            return Err(ProviderError::Transport(msg));
        }
        Ok(self.inventory.lock().unwrap().clone())
    }

    async fn create_instance(&self, bundle_id: &str) -> Result<Vec<String>, ProviderError> {
        self.purchases.lock().unwrap().push(bundle_id.to_string());

        let delay = *self.purchase_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fail = {
            let mut remaining = self.purchase_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                true
            } else {
                false
            }
        };
        if fail {
            return Err(ProviderError::Api {
                code: "ResourceInsufficient.SpecifiedBundleSoldOut".into(),
                message: "bundle sold out".into(),
                request_id: "mock-request".into(),
            });
        }

        let n = self.purchases.lock().unwrap().len();
        Ok(vec![format!("lhins-mock{n}")])
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<Notice>>>,
    failing: Arc<Mutex<bool>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockNotifier {
    /// While set, every send is recorded but reported as undelivered.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Simulate a slow webhook: every send waits this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<NoticeKind> {
        self.sent().iter().map(|n| n.kind).collect()
    }

    pub fn count(&self, kind: NoticeKind) -> usize {
        self.sent().iter().filter(|n| n.kind == kind).count()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, notice: &Notice) -> Result<()> {
        self.sent.lock().unwrap().push(notice.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.failing.lock().unwrap() {
            anyhow::bail!("Webhook returned 500 Internal Server Error");
        }
        Ok(())
    }
}
