use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use semver::Version;
use storefront_catalog::{CancellationToken, JobOutcome, ListingResolver, ResolveJob};
use storefront_core::{FeatureDescriptor, ListingManifest, ListingRef, Operation, Severity};

use super::*;

#[derive(Default)]
struct StaticResolver {
    listings: BTreeMap<String, ListingRef>,
    installed: BTreeSet<String>,
    installed_features: BTreeSet<String>,
    available: BTreeMap<String, BTreeSet<Operation>>,
    features: Vec<FeatureDescriptor>,
    resolve_calls: AtomicUsize,
}

impl StaticResolver {
    fn with_listing(mut self, listing: &ListingRef, available: &[Operation]) -> Self {
        self.listings
            .insert(listing.id().to_string(), listing.clone());
        self.available.insert(
            listing.id().to_string(),
            available.iter().copied().collect(),
        );
        self
    }

    fn installed(mut self, listing: &ListingRef, features: &[&str]) -> Self {
        self.installed.insert(listing.id().to_string());
        self.installed_features
            .extend(features.iter().map(|feature| feature.to_string()));
        self
    }

    fn with_installed_units(mut self, units: &[&str]) -> Self {
        self.installed_features
            .extend(units.iter().map(|unit| unit.to_string()));
        self
    }

    fn with_feature(mut self, id: &str, name: &str) -> Self {
        self.features.push(FeatureDescriptor::new(id, name));
        self
    }
}

impl ListingResolver for StaticResolver {
    fn resolve_listings(
        &self,
        ids: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, ListingRef>> {
        cancel.check()?;
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .iter()
            .filter_map(|id| self.listings.get(id).map(|l| (id.clone(), l.clone())))
            .collect())
    }

    fn resolve_features(
        &self,
        ids: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FeatureDescriptor>> {
        cancel.check()?;
        Ok(self
            .features
            .iter()
            .filter(|descriptor| ids.contains(descriptor.id()))
            .cloned()
            .collect())
    }

    fn installed_feature_ids(&self) -> BTreeSet<String> {
        self.installed_features.clone()
    }

    fn available_operations(&self, listing: &ListingRef) -> BTreeSet<Operation> {
        self.available.get(listing.id()).cloned().unwrap_or_default()
    }

    fn is_installed(&self, listing: &ListingRef) -> bool {
        self.installed.contains(listing.id())
    }
}

fn listing(id: &str, units: &[&str]) -> ListingRef {
    ListingRef::new(ListingManifest {
        id: id.to_string(),
        name: format!("{id} listing"),
        version: Version::new(1, 0, 0),
        description: None,
        installable_units: units.iter().map(|unit| unit.to_string()).collect(),
        features: Vec::new(),
        dependencies: BTreeMap::new(),
        conflicts: BTreeMap::new(),
    })
}

fn operations(model: &SelectionModel) -> Vec<(String, Operation)> {
    model
        .item_to_operation()
        .iter()
        .map(|(item, operation)| (item.id().to_string(), *operation))
        .collect()
}

fn checked(model: &SelectionModel, listing_id: &str) -> Vec<(String, bool)> {
    model
        .feature_entries(listing_id)
        .into_iter()
        .map(|entry| (entry.descriptor().id().to_string(), entry.is_checked()))
        .collect()
}

fn overrides(pairs: &[(&str, Operation)]) -> BTreeMap<String, Operation> {
    pairs
        .iter()
        .map(|(id, operation)| (id.to_string(), *operation))
        .collect()
}

#[test]
fn select_then_deselect_restores_prior_state() {
    let a = listing("a", &["a.core"]);
    let b = listing("b", &["b.core"]);
    let mut model = SelectionModel::default();
    model.select(&b, Operation::Uninstall);
    let before = operations(&model);
    let entries_before = model.item_entries().len();

    model.select(&a, Operation::Install);
    model.select(&a, Operation::None);

    assert_eq!(operations(&model), before);
    assert_eq!(model.item_entries().len(), entries_before);
    assert!(model.feature_entries("a").is_empty());
    assert_eq!(model.operation_for(&a), Operation::None);
}

#[test]
fn deselecting_absent_listing_is_idempotent() {
    let a = listing("a", &[]);
    let mut model = SelectionModel::default();
    model.select(&a, Operation::None);
    model.select(&a, Operation::None);
    assert!(model.is_empty());
    assert_eq!(model.revision(), 0);
}

#[test]
fn reselecting_same_operation_keeps_entry_and_checkmarks() {
    let a = listing("a", &["a.core", "a.extra"]);
    let mut model = SelectionModel::default();
    model.select(&a, Operation::Install);
    assert!(model.set_feature_checked("a", "a.extra", false));

    model.select(&a, Operation::Install);

    assert_eq!(
        checked(&model, "a"),
        vec![("a.core".to_string(), true), ("a.extra".to_string(), false)]
    );
    assert_eq!(model.revision(), 1);
    assert_eq!(model.len(), 1);
}

#[test]
fn operation_change_replaces_entry_with_fresh_children() {
    let a = listing("a", &["a.core", "a.extra"]);
    let b = listing("b", &[]);
    let mut model = SelectionModel::new(["a.core".to_string()].into_iter().collect());
    model.select(&a, Operation::Install);
    model.select(&b, Operation::Install);
    model.set_feature_checked("a", "a.core", false);

    model.select(&a, Operation::Update);

    let entries = model.item_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].item().id(), "b");
    assert_eq!(entries[1].item().id(), "a");
    assert_eq!(entries[1].operation(), Operation::Update);
    assert_eq!(
        checked(&model, "a"),
        vec![("a.core".to_string(), true), ("a.extra".to_string(), false)]
    );
}

#[test]
fn install_checks_every_feature() {
    let a = listing("a", &["a.core", "a.extra"]);
    let mut model = SelectionModel::default();
    model.select(&a, Operation::Install);
    assert!(checked(&model, "a").iter().all(|(_, checked)| *checked));
}

#[test]
fn entry_tree_is_built_lazily_from_the_map() {
    let a = listing("a", &["a.core"]);
    let b = listing("b", &["b.core"]);
    let mut model = SelectionModel::default();
    model.select(&b, Operation::Update);
    model.select(&a, Operation::Install);

    // Nothing read yet; the lazy build still lays entries out in selection order.
    let ids: Vec<&str> = model
        .item_entries()
        .iter()
        .map(|entry| entry.item().id())
        .collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(checked(&model, "b"), vec![("b.core".to_string(), false)]);

    model.set_installed_feature_ids(["b.core".to_string()].into_iter().collect());
    assert_eq!(checked(&model, "b"), vec![("b.core".to_string(), true)]);
}

fn entry_ids(model: &SelectionModel) -> Vec<String> {
    model
        .item_entries()
        .iter()
        .map(|entry| entry.item().id().to_string())
        .collect()
}

#[test]
fn entry_order_does_not_depend_on_when_the_tree_is_read() {
    let a = listing("a", &["a.core"]);
    let b = listing("b", &["b.core"]);
    let c = listing("c", &["c.core"]);

    let mut unread = SelectionModel::default();
    unread.select(&b, Operation::Install);
    unread.select(&a, Operation::Install);
    unread.select(&c, Operation::Install);
    unread.select(&b, Operation::Update);

    let mut read = SelectionModel::default();
    read.select(&b, Operation::Install);
    assert_eq!(entry_ids(&read), vec!["b"]);
    read.select(&a, Operation::Install);
    read.select(&c, Operation::Install);
    assert_eq!(entry_ids(&read), vec!["b", "a", "c"]);
    read.select(&b, Operation::Update);

    assert_eq!(entry_ids(&read), vec!["a", "c", "b"]);
    assert_eq!(entry_ids(&unread), entry_ids(&read));

    // Re-selecting the same operation keeps the position.
    read.select(&a, Operation::Install);
    unread.select(&a, Operation::Install);
    assert_eq!(entry_ids(&unread), vec!["a", "c", "b"]);
    assert_eq!(entry_ids(&unread), entry_ids(&read));

    read.clear();
    read.select(&c, Operation::Install);
    read.select(&a, Operation::Install);
    assert_eq!(entry_ids(&read), vec!["c", "a"]);
}

#[test]
fn feature_entries_compare_by_parent_and_descriptor() {
    let a = listing("a", &["shared"]);
    let b = listing("b", &["shared"]);
    let mut model = SelectionModel::default();
    model.select(&a, Operation::Install);
    model.select(&b, Operation::Install);

    let from_a = model
        .feature_entry(&FeatureKey::new("a", "shared"))
        .expect("feature of a");
    let from_b = model
        .feature_entry(&FeatureKey::new("b", "shared"))
        .expect("feature of b");
    assert_ne!(from_a, from_b);
    assert_eq!(from_a.parent_id(), "a");
    assert_eq!(from_a.key(), FeatureKey::new("a", "shared"));
}

#[test]
fn listeners_fire_only_when_the_map_changes() {
    let a = listing("a", &[]);
    let b = listing("b", &[]);
    let fired = Rc::new(Cell::new(0));
    let observed = fired.clone();
    let mut model = SelectionModel::default();
    model.add_listener(move || observed.set(observed.get() + 1));

    model.select(&a, Operation::Install);
    model.select(&a, Operation::Install);
    model.select(&b, Operation::None);
    model.set_feature_checked("a", "missing", false);
    assert_eq!(fired.get(), 1);

    model.select(&a, Operation::Uninstall);
    model.select(&a, Operation::None);
    assert_eq!(fired.get(), 3);
    assert_eq!(model.revision(), 3);

    model.clear();
    assert_eq!(fired.get(), 3, "clearing an empty model is silent");
}

#[test]
fn selected_feature_descriptors_only_include_checked_features() {
    let a = listing("a", &["a.core", "a.extra"]);
    let b = listing("b", &["b.core"]);
    let mut model = SelectionModel::default();
    model.select(&a, Operation::Install);
    model.select(&b, Operation::Update);
    model.set_feature_checked("a", "a.extra", false);

    let selected: Vec<String> = model
        .selected_feature_descriptors()
        .into_iter()
        .map(|descriptor| descriptor.id().to_string())
        .collect();
    assert_eq!(selected, vec!["a.core"]);
}

#[test]
fn nodes_walk_listings_then_their_features() {
    let a = listing("a", &["a.core", "a.extra"]);
    let mut model = SelectionModel::default();
    model.select(&a, Operation::Install);

    let nodes = model.nodes();
    assert_eq!(nodes.len(), 3);
    assert!(matches!(nodes[0], SelectionNode::Item(entry) if entry.item().id() == "a"));
    assert_eq!(nodes[0].label(), "a listing");
    assert_eq!(nodes[1].depth(), 1);
    assert!(matches!(nodes[2], SelectionNode::Feature(entry) if entry.descriptor().id() == "a.extra"));
}

#[test]
fn resolved_feature_descriptors_keep_checked_state() {
    let a = listing("a", &["a.core.feature.group", "a.extra.feature.group"]);
    let mut model = SelectionModel::default();
    model.select(&a, Operation::Install);
    model.set_feature_checked("a", "a.extra.feature.group", false);
    assert_eq!(model.unresolved_feature_ids().len(), 2);

    let updated = model.apply_resolved_features([FeatureDescriptor::new(
        "a.extra.feature.group",
        "Extra Tools",
    )]);

    assert_eq!(updated, 1);
    let extra = model
        .feature_entry(&FeatureKey::new("a", "a.extra.feature.group"))
        .expect("extra feature");
    assert_eq!(extra.descriptor().name(), "Extra Tools");
    assert!(!extra.is_checked());
    assert_eq!(
        model.unresolved_feature_ids().into_iter().collect::<Vec<_>>(),
        vec!["a.core.feature.group"]
    );

    model.select(&a, Operation::Uninstall);
    let extra = model
        .feature_entry(&FeatureKey::new("a", "a.extra.feature.group"))
        .expect("extra feature after rebuild");
    assert_eq!(extra.descriptor().name(), "Extra Tools");
}

#[test]
fn feature_resolution_job_applies_on_owning_thread() {
    let a = listing("a", &["a.core", "a.extra"]);
    let resolver = Arc::new(StaticResolver::default().with_feature("a.core", "Core"));
    let mut model = SelectionModel::default();
    model.select(&a, Operation::Install);

    let job =
        ResolveJob::features(resolver, model.unresolved_feature_ids()).expect("must spawn");
    let JobOutcome::Completed(descriptors) = job.wait().expect("must finish") else {
        panic!("job must complete");
    };
    assert_eq!(model.apply_resolved_features(descriptors), 1);
    assert_eq!(
        model.unresolved_feature_ids().into_iter().collect::<Vec<_>>(),
        vec!["a.extra"]
    );
}

#[test]
fn viability_of_operation_mixes() {
    let a = listing("a", &["a.core"]);
    let b = listing("b", &["b.core"]);
    let c = listing("c", &["c.core"]);

    let mut model = SelectionModel::default();
    assert_eq!(model.viability(), Viability::Empty);

    model.select(&a, Operation::Install);
    assert_eq!(
        model.viability(),
        Viability::Single {
            operation: Operation::Install,
            count: 1
        }
    );
    assert_eq!(model.viability().message(), "1 item selected for install");

    model.select(&b, Operation::Update);
    assert_eq!(model.viability(), Viability::InstallOrUpdate { count: 2 });
    assert!(model.viability().is_viable());
    assert_eq!(
        model.viability().message(),
        "2 items selected for install or update"
    );

    model.select(&b, Operation::Uninstall);
    let viability = model.viability();
    assert!(!viability.is_viable());
    assert_eq!(
        viability,
        Viability::NotViable {
            operations: vec![Operation::Install, Operation::Uninstall]
        }
    );

    model.select(&c, Operation::Update);
    assert!(!model.viability().is_viable());
}

#[test]
fn operation_grouping_partitions_listings() {
    let a = listing("a", &[]);
    let b = listing("b", &[]);
    let c = listing("c", &[]);
    let mut model = SelectionModel::default();
    model.select(&a, Operation::Install);
    model.select(&b, Operation::Install);
    model.select(&c, Operation::Update);

    let grouping = model.compute_operation_to_items_grouping();
    assert_eq!(grouping.len(), 2);
    assert_eq!(grouping[&Operation::Install], vec![a, b]);
    assert_eq!(grouping[&Operation::Update], vec![c]);
}

#[test]
fn finish_validation_reports_blocking_problems() {
    let a = listing("a", &["a.core"]);
    let b = listing("b", &[]);
    let mut model = SelectionModel::default();
    assert_eq!(model.finish_validation().message, "No items selected");

    model.select(&a, Operation::Install);
    assert!(model.finish_validation().is_ok());

    model.set_feature_checked("a", "a.core", false);
    assert_eq!(model.finish_validation().message, "No features selected");

    model.select(&b, Operation::Uninstall);
    let status = model.finish_validation();
    assert_eq!(status.severity, Severity::Error);
    assert!(status.message.contains("install and uninstall"));

    model.select(&a, Operation::None);
    assert!(model.finish_validation().is_ok());
}

#[test]
fn finish_validation_checks_features_before_viability() {
    let a = listing("a", &[]);
    let c = listing("c", &[]);
    let mut model = SelectionModel::default();
    model.select(&a, Operation::Install);
    model.select(&c, Operation::Change);

    assert!(!model.viability().is_viable());
    assert_eq!(model.finish_validation().message, "No features selected");
}

#[test]
fn button_state_transition_table() {
    use ButtonState::*;

    for (state, next) in [
        (Install, InstallPending),
        (InstallPending, Install),
        (Uninstall, UninstallPending),
        (UninstallPending, Uninstall),
        (Update, UpdatePending),
        (UpdatePending, Update),
        (Change, ChangePending),
        (ChangePending, Change),
        (Disabled, Disabled),
        (UpdateDisabled, UpdateDisabled),
    ] {
        assert_eq!(state.next_state(), next, "{state:?}");
        assert_eq!(state.no_action_state(), next.no_action_state());
    }

    assert_eq!(InstallPending.operation(), Operation::Install);
    assert_eq!(Install.operation(), Operation::None);
    assert_eq!(UpdateDisabled.operation(), Operation::None);
    assert_eq!(ButtonState::for_operation(Operation::None), Disabled);
    assert_eq!(ButtonState::pending_for(Operation::Change), ChangePending);
    assert_eq!(UpdateDisabled.label(), "Update");
    assert!(UpdateDisabled.is_disabled());
}

#[test]
fn button_click_cycles_between_staged_and_idle() {
    let l = listing("l", &["l.core"]);
    let resolver =
        StaticResolver::default().with_listing(&l, &[Operation::Install, Operation::Update]);
    let mut model = SelectionModel::for_resolver(&resolver);
    let mut controller = ButtonStateController::new(l.clone(), &model, &resolver);

    assert_eq!(controller.primary_state(), ButtonState::Install);
    assert_eq!(controller.selectable_states(), [ButtonState::Update]);
    assert_eq!(controller.presentation().font, FontStyle::Bold);
    assert!(controller.presentation().has_menu);

    assert_eq!(
        controller.click(&mut model, &resolver),
        Some(Operation::Install)
    );
    assert_eq!(controller.primary_state(), ButtonState::InstallPending);
    assert_eq!(model.operation_for(&l), Operation::Install);
    assert_eq!(controller.presentation().label, "Install Pending");
    assert_eq!(controller.presentation().font, FontStyle::Italic);

    assert_eq!(controller.click(&mut model, &resolver), Some(Operation::None));
    assert_eq!(controller.primary_state(), ButtonState::Install);
    assert_eq!(model.operation_for(&l), Operation::None);
    assert_eq!(controller.layout_requests(), 2);
}

#[test]
fn button_menu_choice_selects_directly() {
    let l = listing("l", &["l.core"]);
    let resolver = StaticResolver::default()
        .with_listing(&l, &[Operation::Uninstall, Operation::Update])
        .installed(&l, &["l.core"]);
    let mut model = SelectionModel::for_resolver(&resolver);
    let mut controller = ButtonStateController::new(l.clone(), &model, &resolver);
    assert_eq!(controller.primary_state(), ButtonState::Uninstall);
    assert_eq!(controller.presentation().font, FontStyle::Normal);

    assert_eq!(
        controller.choose(ButtonState::Update, &mut model, &resolver),
        Some(Operation::Update)
    );
    assert_eq!(model.operation_for(&l), Operation::Update);
    assert_eq!(controller.primary_state(), ButtonState::UpdatePending);
    assert_eq!(controller.selectable_states(), [ButtonState::Uninstall]);

    assert_eq!(
        controller.choose(ButtonState::Change, &mut model, &resolver),
        None,
        "states that are not on the menu are ignored"
    );
    assert_eq!(
        controller.choose_operation(Operation::Uninstall, &mut model, &resolver),
        Some(Operation::Uninstall)
    );
    assert_eq!(controller.primary_state(), ButtonState::UninstallPending);
}

#[test]
fn button_starts_pending_when_model_already_holds_operation() {
    let l = listing("l", &[]);
    let resolver = StaticResolver::default().with_listing(&l, &[Operation::Install]);
    let mut model = SelectionModel::default();
    model.select(&l, Operation::Install);

    let controller = ButtonStateController::new(l, &model, &resolver);
    assert_eq!(controller.primary_state(), ButtonState::InstallPending);
    assert!(controller.selectable_states().is_empty());
    assert!(!controller.presentation().has_menu);
}

#[test]
fn button_without_operations_is_disabled() {
    let l = listing("l", &[]);
    let resolver = StaticResolver::default().with_listing(&l, &[]);
    let mut model = SelectionModel::default();
    let mut controller = ButtonStateController::new(l.clone(), &model, &resolver);

    assert_eq!(controller.primary_state(), ButtonState::Disabled);
    assert!(!controller.presentation().enabled);
    assert_eq!(controller.click(&mut model, &resolver), None);
    assert!(model.is_empty());
}

#[test]
fn update_of_listing_with_nothing_installed_is_disabled() {
    let l = listing("l", &["l.core"]);
    let resolver = StaticResolver::default().with_listing(&l, &[Operation::Update]);
    let model = SelectionModel::default();
    let controller = ButtonStateController::new(l, &model, &resolver);

    assert_eq!(controller.primary_state(), ButtonState::UpdateDisabled);
    assert_eq!(controller.presentation().label, "Update");
    assert!(!controller.presentation().enabled);
}

#[test]
fn button_sync_follows_changes_made_elsewhere() {
    let l = listing("l", &[]);
    let other = listing("other", &[]);
    let resolver = StaticResolver::default().with_listing(&l, &[Operation::Install]);
    let mut model = SelectionModel::default();
    let mut controller = ButtonStateController::new(l.clone(), &model, &resolver);

    assert!(!controller.sync(&model, &resolver));

    model.select(&other, Operation::Install);
    assert!(
        !controller.sync(&model, &resolver),
        "unrelated change leaves the control as it was"
    );
    assert_eq!(controller.layout_requests(), 0);

    model.select(&l, Operation::Install);
    assert!(controller.sync(&model, &resolver));
    assert_eq!(controller.primary_state(), ButtonState::InstallPending);
    assert_eq!(controller.layout_requests(), 1);
}

#[test]
fn serialize_emits_sorted_pairs() {
    let a = listing("a", &[]);
    let b = listing("b", &[]);
    let mut model = SelectionModel::default();
    assert_eq!(serialize(&model), "");

    model.select(&b, Operation::Uninstall);
    model.select(&a, Operation::Install);
    assert_eq!(serialize(&model), "a=INSTALL b=UNINSTALL");
    assert_eq!(
        SelectionStateSerializer::new().serialize(&model),
        serialize(&model)
    );
}

#[test]
fn round_trip_restores_operations() {
    let a = listing("a", &["a.core"]);
    let b = listing("b", &["b.core"]);
    let resolver = StaticResolver::default()
        .with_listing(&a, &[Operation::Install])
        .with_listing(&b, &[Operation::Uninstall, Operation::Update])
        .installed(&b, &["b.core"]);
    let mut original = SelectionModel::for_resolver(&resolver);
    original.select(&a, Operation::Install);
    original.select(&b, Operation::Update);

    let token = serialize(&original);
    let mut restored = SelectionModel::for_resolver(&resolver);
    let mut serializer = SelectionStateSerializer::new();
    serializer
        .deserialize(
            &mut restored,
            &token,
            &BTreeMap::new(),
            &resolver,
            &CancellationToken::new(),
        )
        .expect("must deserialize");

    assert_eq!(restored.item_to_operation(), original.item_to_operation());
    assert!(!serializer.has_unavailable_items());
    assert_eq!(serialize(&restored), token);
}

#[test]
fn install_of_installed_listing_restores_as_update() {
    let a = listing("a", &["a.core"]);
    let b = listing("b", &["b.core"]);
    let resolver = StaticResolver::default()
        .with_listing(&a, &[Operation::Uninstall])
        .with_listing(&b, &[Operation::Update])
        .installed(&a, &["a.core"])
        .installed(&b, &["b.core"]);
    let mut model = SelectionModel::for_resolver(&resolver);
    let mut serializer = SelectionStateSerializer::new();
    serializer
        .deserialize(
            &mut model,
            "a=INSTALL b=UPDATE",
            &BTreeMap::new(),
            &resolver,
            &CancellationToken::new(),
        )
        .expect("must deserialize");

    assert_eq!(
        operations(&model),
        vec![
            ("a".to_string(), Operation::Update),
            ("b".to_string(), Operation::Update)
        ]
    );
}

#[test]
fn unresolvable_listing_is_reported_not_selected() {
    let x = listing("X", &["x.core"]);
    let resolver = StaticResolver::default().with_listing(&x, &[Operation::Install]);
    let mut model = SelectionModel::default();
    let mut serializer = SelectionStateSerializer::new();
    serializer
        .deserialize(
            &mut model,
            "X=INSTALL Y=BOGUS",
            &BTreeMap::new(),
            &resolver,
            &CancellationToken::new(),
        )
        .expect("must deserialize");

    assert_eq!(operations(&model), vec![("X".to_string(), Operation::Install)]);
    assert!(serializer.has_unavailable_items());
    assert_eq!(
        serializer.unavailable_items(),
        [UnavailableItem {
            id: "Y".to_string(),
            name: None,
            operation: Operation::None,
            reason: UnavailableReason::NotFound,
        }]
    );
}

#[test]
fn rejected_operations_are_reported_with_listing_name() {
    let a = listing("a", &[]);
    let b = listing("b", &["b.core"]);
    let resolver = StaticResolver::default()
        .with_listing(&a, &[Operation::Install])
        .with_listing(&b, &[Operation::Install]);
    let mut model = SelectionModel::default();
    let mut serializer = SelectionStateSerializer::new();
    serializer
        .deserialize(
            &mut model,
            "a=NONE b=UPDATE",
            &BTreeMap::new(),
            &resolver,
            &CancellationToken::new(),
        )
        .expect("must deserialize");

    assert!(model.is_empty());
    let reasons: Vec<(&str, UnavailableReason)> = serializer
        .unavailable_items()
        .iter()
        .map(|item| (item.id.as_str(), item.reason))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("a", UnavailableReason::Rejected),
            ("b", UnavailableReason::NotInstalled)
        ]
    );
    assert_eq!(
        serializer.unavailable_items()[0].name.as_deref(),
        Some("a listing")
    );
}

#[test]
fn update_for_listing_with_nothing_installed_is_not_selected() {
    let a = listing("a", &["a.core"]);
    let b = listing("b", &["b.core", "b.extra"]);
    let resolver = StaticResolver::default()
        .with_listing(&a, &[Operation::Install])
        .with_listing(&b, &[Operation::Update]);
    let mut model = SelectionModel::default();
    let mut serializer = SelectionStateSerializer::new();
    serializer
        .deserialize(
            &mut model,
            "a=INSTALL b=UPDATE",
            &BTreeMap::new(),
            &resolver,
            &CancellationToken::new(),
        )
        .expect("must deserialize");

    assert_eq!(operations(&model), vec![("a".to_string(), Operation::Install)]);
    assert_eq!(model.operation_for_id("b"), Operation::None);
    assert!(model.feature_entries("b").is_empty());
    assert_eq!(serializer.unavailable_items().len(), 1);
    assert_eq!(serializer.unavailable_items()[0].id, "b");
    assert_eq!(
        serializer.unavailable_items()[0].reason,
        UnavailableReason::NotInstalled
    );
    assert_eq!(serializer.unavailable_items()[0].operation, Operation::Update);

    // One installed unit is enough for the same token to select the update.
    let resolver = resolver.with_installed_units(&["b.extra"]);
    let mut model = SelectionModel::default();
    serializer
        .deserialize(
            &mut model,
            "a=INSTALL b=UPDATE",
            &BTreeMap::new(),
            &resolver,
            &CancellationToken::new(),
        )
        .expect("must deserialize");

    assert_eq!(
        operations(&model),
        vec![
            ("a".to_string(), Operation::Install),
            ("b".to_string(), Operation::Update)
        ]
    );
    assert!(!serializer.has_unavailable_items());
}

#[test]
fn overrides_win_over_token_pairs() {
    let a = listing("a", &[]);
    let b = listing("b", &[]);
    let resolver = StaticResolver::default()
        .with_listing(&a, &[Operation::Install])
        .with_listing(&b, &[Operation::Install]);
    let mut model = SelectionModel::default();
    let mut serializer = SelectionStateSerializer::new();
    serializer
        .deserialize(
            &mut model,
            "a=INSTALL",
            &overrides(&[("a", Operation::None), ("b", Operation::Install)]),
            &resolver,
            &CancellationToken::new(),
        )
        .expect("must deserialize");

    assert_eq!(operations(&model), vec![("b".to_string(), Operation::Install)]);
    assert_eq!(serializer.unavailable_items().len(), 1);
    assert_eq!(serializer.unavailable_items()[0].id, "a");
}

#[test]
fn parser_skips_malformed_segments() {
    let decoded = DecodedSelection::parse("  a=INSTALL junk =x y= b=c=UPDATE\tc=uninstall  ");
    let parsed: Vec<(&str, Operation)> = decoded
        .operations()
        .iter()
        .map(|(id, operation)| (id.as_str(), *operation))
        .collect();
    assert_eq!(
        parsed,
        vec![
            ("a", Operation::Install),
            ("b", Operation::None),
            ("c", Operation::None)
        ]
    );
}

#[test]
fn empty_token_skips_catalog_lookup() {
    let resolver = StaticResolver::default();
    let mut model = SelectionModel::default();
    let mut serializer = SelectionStateSerializer::new();
    serializer
        .deserialize(
            &mut model,
            "   ",
            &BTreeMap::new(),
            &resolver,
            &CancellationToken::new(),
        )
        .expect("must deserialize");

    assert_eq!(resolver.resolve_calls.load(Ordering::SeqCst), 0);
    assert!(model.is_empty());
    assert!(!serializer.has_unavailable_items());
}

#[test]
fn cancelled_resolution_leaves_model_untouched() {
    let a = listing("a", &[]);
    let b = listing("b", &[]);
    let resolver = StaticResolver::default()
        .with_listing(&a, &[Operation::Install])
        .with_listing(&b, &[Operation::Install]);
    let mut model = SelectionModel::default();
    model.select(&a, Operation::Install);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut serializer = SelectionStateSerializer::new();
    let err = serializer
        .deserialize(&mut model, "b=INSTALL", &BTreeMap::new(), &resolver, &cancel)
        .expect_err("cancelled resolution must fail");

    assert!(format!("{err:#}").contains("cancelled"));
    assert_eq!(operations(&model), vec![("a".to_string(), Operation::Install)]);
}

#[test]
fn background_resolution_then_apply() {
    let a = listing("a", &["a.core"]);
    let resolver = Arc::new(StaticResolver::default().with_listing(&a, &[Operation::Install]));
    let decoded = DecodedSelection::parse("a=INSTALL gone=UNINSTALL");

    let shared: Arc<dyn ListingResolver> = resolver.clone();
    let job = ResolveJob::listings(shared, decoded.listing_ids()).expect("must spawn");
    let JobOutcome::Completed(resolved) = job.wait().expect("must finish") else {
        panic!("job must complete");
    };

    let mut model = SelectionModel::for_resolver(resolver.as_ref());
    let mut serializer = SelectionStateSerializer::new();
    serializer.apply(&mut model, &decoded, &resolved, resolver.as_ref());

    assert_eq!(operations(&model), vec![("a".to_string(), Operation::Install)]);
    assert_eq!(serializer.unavailable_items()[0].id, "gone");
    assert_eq!(
        serializer.unavailable_items()[0].operation,
        Operation::Uninstall
    );
}

#[test]
fn url_encoding_round_trip() {
    let token = "org.a=INSTALL org.b=UPDATE";
    let encoded = encode_for_url(token);
    assert_eq!(encoded, "org.a%3DINSTALL%20org.b%3DUPDATE");
    assert_eq!(decode_from_url(&encoded).expect("must decode"), token);
    assert!(decode_from_url("%FF").is_err());
}
