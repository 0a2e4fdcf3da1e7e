//! Shared types for the LHBOT agent.
//!
//! These types form the data model used across all modules. The cloud
//! adapter converts wire records into them, the engine decides on them,
//! and the notifier renders them.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Provider-reported availability of a bundle.
///
/// Anything other than `AVAILABLE` counts as "not available"; unknown
/// values are kept verbatim so they can still be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SalesState {
    Available,
    SoldOut,
    Other(String),
}

impl SalesState {
    pub fn is_available(&self) -> bool {
        matches!(self, SalesState::Available)
    }

    pub fn as_str(&self) -> &str {
        match self {
            SalesState::Available => "AVAILABLE",
            SalesState::SoldOut => "SOLD_OUT",
            SalesState::Other(s) => s,
        }
    }
}

impl From<String> for SalesState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "AVAILABLE" => SalesState::Available,
            "SOLD_OUT" => SalesState::SoldOut,
            _ => SalesState::Other(s),
        }
    }
}

impl From<&str> for SalesState {
    fn from(s: &str) -> Self {
        SalesState::from(s.to_string())
    }
}

impl fmt::Display for SalesState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchasable compute offering.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    /// Opaque provider identifier, passed back on purchase.
    pub id: String,
    /// Human-readable family, e.g. "锐驰型" or "Starter".
    pub type_description: String,
    pub cpu: u32,
    /// Memory in GB.
    pub memory: u32,
    pub sales_state: SalesState,
}

impl Bundle {
    /// Key used in reports: `{type}-{cpu}C{memory}G`.
    pub fn display_key(&self) -> String {
        format!("{}-{}C{}G", self.type_description, self.cpu, self.memory)
    }

    pub fn is_available(&self) -> bool {
        self.sales_state.is_available()
    }

    /// Helper to build a test bundle.
    #[cfg(test)]
    pub fn sample(id: &str, state: SalesState) -> Self {
        Bundle {
            id: id.to_string(),
            type_description: format!("type-{id}"),
            cpu: 2,
            memory: 4,
            sales_state: state,
        }
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.display_key(), self.id, self.sales_state)
    }
}

/// One inventory query result, in provider order.
///
/// Order matters: the first available bundle wins the purchase.
pub type BundleSnapshot = Vec<Bundle>;

/// Display key → sales state for the bundles scanned in one cycle.
///
/// Later duplicates overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleReport {
    entries: BTreeMap<String, SalesState>,
}

impl BundleReport {
    pub fn record(&mut self, bundle: &Bundle) {
        self.entries
            .insert(bundle.display_key(), bundle.sales_state.clone());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SalesState)> {
        self.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<&SalesState> {
        self.entries.get(key)
    }
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// What happened to the purchase in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    /// No attempt: nothing available, already bought, or one in flight.
    NotAttempted,
    Succeeded {
        bundle_id: String,
        instance_ids: Vec<String>,
    },
    Failed {
        bundle_id: String,
        reason: String,
    },
}

/// Which notification a cycle produced (purchase notices excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Rate-limited status message when nothing is available.
    Heartbeat,
    /// Immediate alert: at least one bundle is available.
    Available,
    /// A purchase just completed.
    Purchased,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeKind::Heartbeat => write!(f, "heartbeat"),
            NoticeKind::Available => write!(f, "available"),
            NoticeKind::Purchased => write!(f, "purchased"),
        }
    }
}

/// Summary of a single fetch-decide-purchase-notify cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub bundles_seen: usize,
    pub availability_found: bool,
    pub report: BundleReport,
    pub purchase: PurchaseOutcome,
    /// Status notice attempted this cycle, if any.
    pub notice: Option<NoticeKind>,
    /// Whether that notice was confirmed delivered.
    pub notice_delivered: bool,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let purchase = match &self.purchase {
            PurchaseOutcome::NotAttempted => "none".to_string(),
            PurchaseOutcome::Succeeded { bundle_id, .. } => format!("bought {bundle_id}"),
            PurchaseOutcome::Failed { bundle_id, .. } => format!("failed {bundle_id}"),
        };
        let notice = match self.notice {
            Some(kind) if self.notice_delivered => kind.to_string(),
            Some(kind) => format!("{kind} (undelivered)"),
            None => "none".to_string(),
        };
        write!(
            f,
            "bundles={} available={} purchase={} notice={}",
            self.bundles_seen, self.availability_found, purchase, notice,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures reported by the cloud provider collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Failed to build request: {0}")]
    Request(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("API error {code}: {message} (request id {request_id})")]
    Api {
        code: String,
        message: String,
        request_id: String,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
