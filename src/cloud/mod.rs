//! Cloud provider integration.
//!
//! Defines the `BundleProvider` trait the engine talks to and provides the
//! Tencent Cloud Lighthouse implementation.

pub mod lighthouse;
pub mod signer;

use async_trait::async_trait;

use crate::types::{BundleSnapshot, ProviderError};

/// Inventory and purchase calls against a compute provider.
///
/// Both calls are single attempts; retrying is the caller's business.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BundleProvider: Send + Sync {
    /// Fetch the watched bundles, in provider order.
    async fn fetch_bundles(&self) -> Result<BundleSnapshot, ProviderError>;

    /// Buy one instance of `bundle_id`. Returns the created instance ids.
    async fn create_instance(&self, bundle_id: &str) -> Result<Vec<String>, ProviderError>;
}
