use std::collections::{BTreeMap, BTreeSet};

use storefront_core::{FeatureDescriptor, ListingRef, Operation};

/// Arena key of a feature entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureKey {
    pub listing_id: String,
    pub feature_id: String,
}

impl FeatureKey {
    pub fn new(listing_id: impl Into<String>, feature_id: impl Into<String>) -> Self {
        Self {
            listing_id: listing_id.into(),
            feature_id: feature_id.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureEntry {
    parent: String,
    descriptor: FeatureDescriptor,
    checked: bool,
}

impl FeatureEntry {
    pub fn parent_id(&self) -> &str {
        &self.parent
    }

    pub fn descriptor(&self) -> &FeatureDescriptor {
        &self.descriptor
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn key(&self) -> FeatureKey {
        FeatureKey::new(self.parent.clone(), self.descriptor.id())
    }
}

impl PartialEq for FeatureEntry {
    fn eq(&self, other: &Self) -> bool {
        self.parent == other.parent && self.descriptor == other.descriptor
    }
}

impl Eq for FeatureEntry {}

/// A listing chosen for an operation. Children are fixed at creation; an
/// operation change replaces the whole entry.
#[derive(Debug, Clone)]
pub struct CatalogItemEntry {
    item: ListingRef,
    operation: Operation,
    children: Vec<String>,
}

impl CatalogItemEntry {
    pub fn item(&self) -> &ListingRef {
        &self.item
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn child_ids(&self) -> &[String] {
        &self.children
    }
}

impl PartialEq for CatalogItemEntry {
    fn eq(&self, other: &Self) -> bool {
        self.item == other.item
    }
}

impl Eq for CatalogItemEntry {}

/// Node of the listing/feature tree shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionNode<'a> {
    Item(&'a CatalogItemEntry),
    Feature(&'a FeatureEntry),
}

impl<'a> SelectionNode<'a> {
    pub fn label(&self) -> &'a str {
        match self {
            Self::Item(entry) => entry.item.name(),
            Self::Feature(entry) => entry.descriptor.name(),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Self::Item(_) => 0,
            Self::Feature(_) => 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EntryTree {
    items: Vec<CatalogItemEntry>,
    features: BTreeMap<FeatureKey, FeatureEntry>,
}

impl EntryTree {
    pub(crate) fn items(&self) -> &[CatalogItemEntry] {
        &self.items
    }

    pub(crate) fn feature(&self, key: &FeatureKey) -> Option<&FeatureEntry> {
        self.features.get(key)
    }

    pub(crate) fn features(&self) -> impl Iterator<Item = &FeatureEntry> {
        self.features.values()
    }

    pub(crate) fn children<'a>(
        &'a self,
        entry: &'a CatalogItemEntry,
    ) -> impl Iterator<Item = &'a FeatureEntry> + 'a {
        entry.children.iter().filter_map(move |feature_id| {
            self.features
                .get(&FeatureKey::new(entry.item.id(), feature_id.as_str()))
        })
    }

    /// Appends a fresh entry for `item`, dropping any previous one.
    pub(crate) fn insert(
        &mut self,
        item: &ListingRef,
        operation: Operation,
        installed_feature_ids: &BTreeSet<String>,
        resolved_features: &BTreeMap<String, FeatureDescriptor>,
    ) {
        self.remove(item.id());

        let mut children = Vec::new();
        for descriptor in item.manifest().feature_descriptors() {
            let descriptor = resolved_features
                .get(descriptor.id())
                .cloned()
                .unwrap_or(descriptor);
            let checked = initially_checked(operation, descriptor.id(), installed_feature_ids);
            children.push(descriptor.id().to_string());
            self.features.insert(
                FeatureKey::new(item.id(), descriptor.id()),
                FeatureEntry {
                    parent: item.id().to_string(),
                    descriptor,
                    checked,
                },
            );
        }

        self.items.push(CatalogItemEntry {
            item: item.clone(),
            operation,
            children,
        });
    }

    pub(crate) fn remove(&mut self, item_id: &str) -> bool {
        let Some(position) = self.items.iter().position(|entry| entry.item.id() == item_id) else {
            return false;
        };
        let entry = self.items.remove(position);
        for feature_id in &entry.children {
            self.features
                .remove(&FeatureKey::new(item_id, feature_id.as_str()));
        }
        true
    }

    pub(crate) fn set_checked(&mut self, key: &FeatureKey, checked: bool) -> bool {
        match self.features.get_mut(key) {
            Some(entry) => {
                entry.checked = checked;
                true
            }
            None => false,
        }
    }

    /// Replaces matching descriptors; `checked` is left alone.
    pub(crate) fn apply_resolved(&mut self, resolved: &BTreeMap<String, FeatureDescriptor>) -> usize {
        let mut updated = 0;
        for entry in self.features.values_mut() {
            if let Some(descriptor) = resolved.get(entry.descriptor.id()) {
                entry.descriptor.replace_with(descriptor.clone());
                updated += 1;
            }
        }
        updated
    }
}

// An update only touches features that are already present unless the user
// opts in.
fn initially_checked(
    operation: Operation,
    feature_id: &str,
    installed_feature_ids: &BTreeSet<String>,
) -> bool {
    match operation {
        Operation::Update => installed_feature_ids.contains(feature_id),
        Operation::None | Operation::Install | Operation::Uninstall | Operation::Change => true,
    }
}
