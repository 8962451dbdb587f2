use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use semver::Version;
use storefront_core::{FeatureDescriptor, ListingManifest, ListingRef, Operation};

use crate::{
    read_install_receipts, CancellationToken, CatalogIndex, InstallReceipt, ListingResolver,
    StorefrontLayout,
};

/// Resolver backed by an on-disk catalog index and the install receipts of
/// the state root.
#[derive(Debug, Clone)]
pub struct LocalCatalog {
    index: CatalogIndex,
    receipts: BTreeMap<String, InstallReceipt>,
}

impl LocalCatalog {
    pub fn open(layout: &StorefrontLayout) -> Result<Self> {
        let index = CatalogIndex::open(layout.catalog_root());
        let receipts = read_install_receipts(layout)?;
        Ok(Self::from_parts(index, receipts))
    }

    pub fn from_parts(index: CatalogIndex, receipts: Vec<InstallReceipt>) -> Self {
        let receipts = receipts
            .into_iter()
            .map(|receipt| (receipt.id.clone(), receipt))
            .collect();
        Self { index, receipts }
    }

    pub fn index(&self) -> &CatalogIndex {
        &self.index
    }

    pub fn receipt(&self, id: &str) -> Option<&InstallReceipt> {
        self.receipts.get(id)
    }

    pub fn receipts(&self) -> impl Iterator<Item = &InstallReceipt> {
        self.receipts.values()
    }

    /// Manifests of the installed versions, keyed by listing id. Falls back
    /// to the current catalog version when the installed one is gone from
    /// the index; listings missing from the catalog entirely are skipped.
    pub fn installed_manifests(&self) -> Result<BTreeMap<String, ListingManifest>> {
        let mut manifests = BTreeMap::new();
        for receipt in self.receipts.values() {
            let versions = self.index.listing_versions(&receipt.id)?;
            let installed = versions
                .iter()
                .find(|manifest| manifest.version.to_string() == receipt.version)
                .or_else(|| versions.first())
                .cloned();
            match installed {
                Some(manifest) => {
                    manifests.insert(receipt.id.clone(), manifest);
                }
                None => tracing::debug!(
                    "installed listing '{}' is not in the catalog",
                    receipt.id
                ),
            }
        }
        Ok(manifests)
    }

    /// Current version of every listing whose id contains `needle`.
    /// Unreadable listings are logged and skipped.
    pub fn search(&self, needle: &str) -> Result<Vec<ListingRef>> {
        let ids = self.index.search_ids(needle)?.into_iter().collect();
        let resolved = self.resolve_listings(&ids, &CancellationToken::new())?;
        Ok(resolved.into_values().collect())
    }

    fn has_newer_version(&self, listing: &ListingRef, receipt: &InstallReceipt) -> bool {
        match Version::parse(&receipt.version) {
            Ok(installed) => listing.manifest().version > installed,
            Err(err) => {
                tracing::warn!(
                    "install receipt for '{}' has unparseable version '{}': {}",
                    receipt.id,
                    receipt.version,
                    err
                );
                false
            }
        }
    }
}

impl ListingResolver for LocalCatalog {
    fn resolve_listings(
        &self,
        ids: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, ListingRef>> {
        let mut resolved = BTreeMap::new();
        for id in ids {
            cancel.check()?;
            match self.index.current(id) {
                Ok(Some(manifest)) => {
                    resolved.insert(id.clone(), ListingRef::new(manifest));
                }
                Ok(None) => {
                    tracing::debug!("listing '{}' is not in the catalog", id);
                }
                Err(err) => {
                    tracing::warn!("skipping unreadable listing '{}': {:#}", id, err);
                }
            }
        }
        Ok(resolved)
    }

    fn resolve_features(
        &self,
        ids: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FeatureDescriptor>> {
        let mut found: BTreeMap<String, FeatureDescriptor> = BTreeMap::new();
        for listing_id in self.index.listing_ids()? {
            cancel.check()?;
            let manifest = match self.index.current(&listing_id) {
                Ok(Some(manifest)) => manifest,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!("skipping unreadable listing '{}': {:#}", listing_id, err);
                    continue;
                }
            };
            for descriptor in manifest.feature_descriptors() {
                if ids.contains(descriptor.id()) && !descriptor.has_fallback_name() {
                    found.entry(descriptor.id().to_string()).or_insert(descriptor);
                }
            }
        }
        Ok(found.into_values().collect())
    }

    fn installed_feature_ids(&self) -> BTreeSet<String> {
        self.receipts
            .values()
            .flat_map(|receipt| receipt.features.iter().cloned())
            .collect()
    }

    fn available_operations(&self, listing: &ListingRef) -> BTreeSet<Operation> {
        let mut operations = BTreeSet::new();
        let Some(receipt) = self.receipts.get(listing.id()) else {
            operations.insert(Operation::Install);
            return operations;
        };

        operations.insert(Operation::Uninstall);
        if self.has_newer_version(listing, receipt) {
            operations.insert(Operation::Update);
        }
        let has_missing_units = listing
            .installable_units()
            .iter()
            .any(|unit| !receipt.features.contains(unit));
        if has_missing_units {
            operations.insert(Operation::Change);
        }
        operations
    }

    fn is_installed(&self, listing: &ListingRef) -> bool {
        self.receipts.contains_key(listing.id())
    }
}
