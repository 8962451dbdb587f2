use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::feature::FeatureDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingFeature {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingManifest {
    pub id: String,
    pub name: String,
    pub version: Version,
    pub description: Option<String>,
    #[serde(default)]
    pub installable_units: Vec<String>,
    #[serde(default)]
    pub features: Vec<ListingFeature>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionReq>,
    #[serde(default)]
    pub conflicts: BTreeMap<String, VersionReq>,
}

impl ListingManifest {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self = toml::from_str(input).context("failed to parse listing manifest")?;
        if !is_token_safe_id(&manifest.id) {
            return Err(anyhow!(
                "listing id '{}' must be non-empty and contain no whitespace or '='",
                manifest.id
            ));
        }
        if manifest.conflicts.contains_key(&manifest.id) {
            return Err(anyhow!("listing '{}' conflicts with itself", manifest.id));
        }
        if manifest.dependencies.contains_key(&manifest.id) {
            return Err(anyhow!("listing '{}' depends on itself", manifest.id));
        }

        let mut seen_units = HashSet::new();
        for unit in &manifest.installable_units {
            if unit.trim().is_empty() {
                return Err(anyhow!(
                    "installable unit id must not be empty for listing '{}'",
                    manifest.id
                ));
            }
            if !seen_units.insert(unit.as_str()) {
                return Err(anyhow!(
                    "duplicate installable unit '{}' for listing '{}'",
                    unit,
                    manifest.id
                ));
            }
        }
        for feature in &manifest.features {
            if !seen_units.contains(feature.id.as_str()) {
                return Err(anyhow!(
                    "feature metadata '{}' does not name an installable unit of listing '{}'",
                    feature.id,
                    manifest.id
                ));
            }
        }
        Ok(manifest)
    }

    /// Descriptors for every declared unit, using the feature metadata when
    /// the manifest has it.
    pub fn feature_descriptors(&self) -> Vec<FeatureDescriptor> {
        self.installable_units
            .iter()
            .map(|unit| {
                self.features
                    .iter()
                    .find(|feature| &feature.id == unit)
                    .map(|feature| FeatureDescriptor::new(unit.clone(), feature.name.clone()))
                    .unwrap_or_else(|| FeatureDescriptor::from_unit_id(unit.clone()))
            })
            .collect()
    }
}

/// Listing ids end up verbatim in selection tokens, so they may not contain
/// whitespace or '='.
pub fn is_token_safe_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|ch| ch.is_whitespace() || ch == '=')
}

/// Shared handle to a catalog listing. Equality, hashing and ordering use
/// the listing id only.
#[derive(Debug, Clone)]
pub struct ListingRef(Arc<ListingManifest>);

impl ListingRef {
    pub fn new(manifest: ListingManifest) -> Self {
        Self(Arc::new(manifest))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn manifest(&self) -> &ListingManifest {
        &self.0
    }

    pub fn installable_units(&self) -> &[String] {
        &self.0.installable_units
    }
}

impl From<ListingManifest> for ListingRef {
    fn from(value: ListingManifest) -> Self {
        Self::new(value)
    }
}

impl PartialEq for ListingRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ListingRef {}

impl Hash for ListingRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for ListingRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ListingRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(other.id())
    }
}
