//! Persistence layer.
//!
//! The only durable state is the purchase marker: a small file whose
//! presence means an instance was already bought. Its content (an RFC 3339
//! timestamp) is informational.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Durable "already purchased" marker.
#[derive(Debug, Clone)]
pub struct PurchaseMarker {
    path: PathBuf,
}

impl PurchaseMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a previous run already completed a purchase.
    pub fn exists(&self) -> bool {
        let found = self.path.exists();
        if found {
            info!(path = %self.path.display(), "Purchase marker found");
        } else {
            debug!(path = %self.path.display(), "No purchase marker");
        }
        found
    }

    /// Record a completed purchase.
    pub fn write(&self, at: DateTime<Utc>) -> Result<()> {
        std::fs::write(&self.path, at.to_rfc3339())
            .with_context(|| format!("Failed to write purchase marker {}", self.path.display()))?;
        info!(path = %self.path.display(), "Purchase marker written");
        Ok(())
    }

    /// Timestamp stored in the marker, if readable.
    pub fn read(&self) -> Result<Option<DateTime<Utc>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read purchase marker {}", self.path.display()))?;
        let at = DateTime::parse_from_rfc3339(raw.trim())
            .with_context(|| format!("Invalid timestamp in {}", self.path.display()))?;
        Ok(Some(at.with_timezone(&Utc)))
    }

    /// Delete the marker (manual reset or tests).
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to delete purchase marker {}", self.path.display()))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
