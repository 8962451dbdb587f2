use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use storefront_catalog::ListingResolver;
use storefront_core::{FeatureDescriptor, ListingRef, Operation, Status};

use crate::entry::{CatalogItemEntry, EntryTree, FeatureEntry, FeatureKey, SelectionNode};
use crate::viability::Viability;

type Listener = Box<dyn FnMut()>;

/// Per-session store of `listing -> operation`.
///
/// The map is authoritative. The listing/feature entry tree is derived from
/// it, built lazily on first read and kept in step by [`SelectionModel::select`]
/// afterwards. Listeners run synchronously after every call that changed the
/// map.
pub struct SelectionModel {
    item_to_operation: BTreeMap<ListingRef, Operation>,
    // Listing id -> position of its latest operation change; entries are
    // laid out in this order whether the tree is built eagerly or lazily.
    selection_order: BTreeMap<String, u64>,
    next_sequence: u64,
    installed_feature_ids: BTreeSet<String>,
    resolved_features: BTreeMap<String, FeatureDescriptor>,
    entries: OnceCell<EntryTree>,
    listeners: Vec<Listener>,
    revision: u64,
}

impl SelectionModel {
    pub fn new(installed_feature_ids: BTreeSet<String>) -> Self {
        Self {
            item_to_operation: BTreeMap::new(),
            selection_order: BTreeMap::new(),
            next_sequence: 0,
            installed_feature_ids,
            resolved_features: BTreeMap::new(),
            entries: OnceCell::new(),
            listeners: Vec::new(),
            revision: 0,
        }
    }

    pub fn for_resolver(resolver: &dyn ListingResolver) -> Self {
        Self::new(resolver.installed_feature_ids())
    }

    pub fn add_listener(&mut self, listener: impl FnMut() + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Bumped once per change notification.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn select(&mut self, item: &ListingRef, operation: Operation) {
        let changed = if operation.is_none() {
            let removed = self.item_to_operation.remove(item).is_some();
            self.selection_order.remove(item.id());
            if let Some(tree) = self.entries.get_mut() {
                tree.remove(item.id());
            }
            removed
        } else if self.item_to_operation.get(item) == Some(&operation) {
            false
        } else {
            // Re-key so the map holds the handle the caller resolved last.
            self.item_to_operation.remove(item);
            self.item_to_operation.insert(item.clone(), operation);
            self.selection_order
                .insert(item.id().to_string(), self.next_sequence);
            self.next_sequence += 1;
            if let Some(tree) = self.entries.get_mut() {
                tree.insert(
                    item,
                    operation,
                    &self.installed_feature_ids,
                    &self.resolved_features,
                );
            }
            true
        };

        if changed {
            tracing::debug!("selected {} for '{}'", operation, item.id());
            self.notify();
        }
    }

    pub fn clear(&mut self) {
        if self.item_to_operation.is_empty() {
            return;
        }
        self.item_to_operation.clear();
        self.selection_order.clear();
        self.entries = OnceCell::new();
        self.notify();
    }

    pub fn operation_for(&self, item: &ListingRef) -> Operation {
        self.item_to_operation
            .get(item)
            .copied()
            .unwrap_or_default()
    }

    pub fn operation_for_id(&self, id: &str) -> Operation {
        self.item_to_operation
            .iter()
            .find(|(item, _)| item.id() == id)
            .map(|(_, operation)| *operation)
            .unwrap_or_default()
    }

    pub fn item_to_operation(&self) -> &BTreeMap<ListingRef, Operation> {
        &self.item_to_operation
    }

    pub fn is_empty(&self) -> bool {
        self.item_to_operation.is_empty()
    }

    pub fn len(&self) -> usize {
        self.item_to_operation.len()
    }

    pub fn installed_feature_ids(&self) -> &BTreeSet<String> {
        &self.installed_feature_ids
    }

    /// Replaces the installed-feature snapshot. The initial checked state of
    /// update entries depends on it, so the entry tree is rebuilt on next read.
    pub fn set_installed_feature_ids(&mut self, ids: BTreeSet<String>) {
        self.installed_feature_ids = ids;
        self.entries = OnceCell::new();
    }

    pub fn item_entries(&self) -> &[CatalogItemEntry] {
        self.tree().items()
    }

    pub fn feature_entries(&self, id: &str) -> Vec<&FeatureEntry> {
        let tree = self.tree();
        tree.items()
            .iter()
            .find(|entry| entry.item().id() == id)
            .map(|entry| tree.children(entry).collect())
            .unwrap_or_default()
    }

    pub fn feature_entry(&self, key: &FeatureKey) -> Option<&FeatureEntry> {
        self.tree().feature(key)
    }

    /// Depth-first walk: every listing followed by its features.
    pub fn nodes(&self) -> Vec<SelectionNode<'_>> {
        let tree = self.tree();
        let mut nodes = Vec::new();
        for entry in tree.items() {
            nodes.push(SelectionNode::Item(entry));
            nodes.extend(tree.children(entry).map(SelectionNode::Feature));
        }
        nodes
    }

    /// Toggles a feature checkbox. Returns false when no such feature is
    /// selected. Does not notify: the listing map is unchanged.
    pub fn set_feature_checked(&mut self, listing_id: &str, feature_id: &str, checked: bool) -> bool {
        let mut tree = self.take_tree();
        let found = tree.set_checked(&FeatureKey::new(listing_id, feature_id), checked);
        self.entries = OnceCell::from(tree);
        found
    }

    pub fn selected_feature_descriptors(&self) -> BTreeSet<FeatureDescriptor> {
        self.tree()
            .features()
            .filter(|entry| entry.is_checked())
            .map(|entry| entry.descriptor().clone())
            .collect()
    }

    /// Feature ids still shown under their fallback name.
    pub fn unresolved_feature_ids(&self) -> BTreeSet<String> {
        self.tree()
            .features()
            .filter(|entry| entry.descriptor().has_fallback_name())
            .map(|entry| entry.descriptor().id().to_string())
            .collect()
    }

    /// Merges descriptors supplied by the resolver. Checked state is kept;
    /// entries created later pick the descriptors up as well.
    pub fn apply_resolved_features(
        &mut self,
        descriptors: impl IntoIterator<Item = FeatureDescriptor>,
    ) -> usize {
        let mut incoming = BTreeMap::new();
        for descriptor in descriptors {
            incoming.insert(descriptor.id().to_string(), descriptor);
        }

        let mut tree = self.take_tree();
        let updated = tree.apply_resolved(&incoming);
        self.entries = OnceCell::from(tree);
        self.resolved_features.extend(incoming);
        tracing::debug!("applied {} resolved feature descriptors", updated);
        updated
    }

    pub fn compute_operation_to_items_grouping(&self) -> BTreeMap<Operation, Vec<ListingRef>> {
        let mut grouping: BTreeMap<Operation, Vec<ListingRef>> = BTreeMap::new();
        for (item, operation) in &self.item_to_operation {
            if operation.is_none() {
                continue;
            }
            grouping.entry(*operation).or_default().push(item.clone());
        }
        grouping
    }

    pub fn viability(&self) -> Viability {
        Viability::from_grouping(&self.compute_operation_to_items_grouping())
    }

    /// Whether the wizard may move on to computing a plan.
    pub fn finish_validation(&self) -> Status {
        if self.is_empty() {
            return Status::error("No items selected");
        }

        let removes_something = self
            .item_to_operation
            .values()
            .any(|operation| *operation == Operation::Uninstall);
        if !removes_something && self.selected_feature_descriptors().is_empty() {
            return Status::error("No features selected");
        }

        let viability = self.viability();
        if !viability.is_viable() {
            return Status::error(viability.message());
        }

        Status::ok()
    }

    fn tree(&self) -> &EntryTree {
        self.entries.get_or_init(|| self.build_tree())
    }

    fn take_tree(&mut self) -> EntryTree {
        match self.entries.take() {
            Some(tree) => tree,
            None => self.build_tree(),
        }
    }

    fn build_tree(&self) -> EntryTree {
        let mut selected: Vec<(&ListingRef, Operation)> = self
            .item_to_operation
            .iter()
            .filter(|(_, operation)| !operation.is_none())
            .map(|(item, operation)| (item, *operation))
            .collect();
        selected.sort_by_key(|(item, _)| self.selection_order.get(item.id()).copied());

        let mut tree = EntryTree::default();
        for (item, operation) in selected {
            tree.insert(
                item,
                operation,
                &self.installed_feature_ids,
                &self.resolved_features,
            );
        }
        tracing::debug!("built selection entries for {} listings", tree.items().len());
        tree
    }

    fn notify(&mut self) {
        self.revision += 1;
        for listener in &mut self.listeners {
            listener();
        }
    }
}

impl Default for SelectionModel {
    fn default() -> Self {
        Self::new(BTreeSet::new())
    }
}

impl fmt::Debug for SelectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionModel")
            .field("item_to_operation", &self.item_to_operation)
            .field("installed_feature_ids", &self.installed_feature_ids)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// True when the listing, or at least one of its units, is installed.
pub(crate) fn listing_is_present(listing: &ListingRef, resolver: &dyn ListingResolver) -> bool {
    if resolver.is_installed(listing) {
        return true;
    }
    let installed = resolver.installed_feature_ids();
    listing
        .installable_units()
        .iter()
        .any(|unit| installed.contains(unit))
}
