use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use storefront_core::{FeatureDescriptor, ListingRef, Operation};

/// Shared cancel flag handed to long-running resolver calls.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            anyhow::bail!("resolution cancelled");
        }
        Ok(())
    }
}

/// What the selection core needs from the catalog.
pub trait ListingResolver: Send + Sync {
    /// Looks up listings by id in one batch. Ids that do not resolve are
    /// absent from the result.
    fn resolve_listings(
        &self,
        ids: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, ListingRef>>;

    /// Richer descriptors for feature ids; unknown ids are absent.
    fn resolve_features(
        &self,
        ids: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FeatureDescriptor>>;

    fn installed_feature_ids(&self) -> BTreeSet<String>;

    /// Operations the catalog offers for `listing`; iteration order decides
    /// which one is primary.
    fn available_operations(&self, listing: &ListingRef) -> BTreeSet<Operation>;

    fn is_installed(&self, listing: &ListingRef) -> bool;
}
