use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use storefront_catalog::LocalCatalog;
use storefront_core::{ListingManifest, ListingRef, Operation, Severity};
use storefront_selection::SelectionModel;

use crate::conflicts::conflict_details;
use crate::order::dependency_order;
use crate::plan::{ChangePlanner, PlanResult, PlanStep};

/// Plans against the manifests of the installed listings: conflicts and
/// dependencies are checked locally, nothing is fetched.
#[derive(Debug, Clone, Default)]
pub struct LocalPlanner {
    installed: BTreeMap<String, ListingManifest>,
}

impl LocalPlanner {
    pub fn new(installed: BTreeMap<String, ListingManifest>) -> Self {
        Self { installed }
    }

    pub fn from_catalog(catalog: &LocalCatalog) -> Result<Self> {
        Ok(Self::new(catalog.installed_manifests()?))
    }
}

impl ChangePlanner for LocalPlanner {
    fn compute_change_plan(&self, model: &SelectionModel) -> PlanResult {
        if model.is_empty() {
            return PlanResult::cancelled("No items selected");
        }
        let validation = model.finish_validation();
        if !validation.is_ok() {
            return PlanResult::error(validation.message);
        }

        let mut changing: BTreeMap<String, &ListingManifest> = BTreeMap::new();
        let mut removing: BTreeMap<String, &ListingManifest> = BTreeMap::new();
        for (item, operation) in model.item_to_operation() {
            match operation {
                Operation::Install | Operation::Update | Operation::Change => {
                    changing.insert(item.id().to_string(), item.manifest());
                }
                Operation::Uninstall => {
                    let manifest = self.installed.get(item.id()).unwrap_or(item.manifest());
                    removing.insert(item.id().to_string(), manifest);
                }
                Operation::None => {}
            }
        }

        let remaining: BTreeMap<String, &ListingManifest> = self
            .installed
            .iter()
            .filter(|(id, _)| !removing.contains_key(*id) && !changing.contains_key(*id))
            .map(|(id, manifest)| (id.clone(), manifest))
            .collect();

        let conflicts = conflict_details(&changing, &remaining);
        if !conflicts.is_empty() {
            tracing::debug!("plan blocked by {} conflicts", conflicts.len());
            return PlanResult {
                severity: Severity::Error,
                details: conflicts,
                steps: Vec::new(),
            };
        }

        let mut details = Vec::new();
        details.extend(dependency_warnings(&changing, &remaining, &removing));
        details.extend(removal_warnings(&remaining, &removing));
        let severity = if details.is_empty() {
            Severity::Ok
        } else {
            Severity::Warning
        };

        let mut steps = Vec::new();
        let install_order = match dependency_order(&changing) {
            Ok(order) => order,
            Err(err) => return PlanResult::error(err.to_string()),
        };
        let removal_order = match dependency_order(&removing) {
            Ok(order) => order,
            Err(err) => return PlanResult::error(err.to_string()),
        };
        // Dependents go first when removing.
        for id in removal_order.into_iter().rev().chain(install_order) {
            if let Some(item) = listing_by_id(model, &id) {
                steps.push(plan_step(model, item, &changing, &removing));
            }
        }

        details.insert(0, model.viability().message());
        tracing::info!(
            "planned {} steps with severity {}",
            steps.len(),
            severity.as_str()
        );
        PlanResult {
            severity,
            details,
            steps,
        }
    }
}

fn dependency_warnings(
    changing: &BTreeMap<String, &ListingManifest>,
    remaining: &BTreeMap<String, &ListingManifest>,
    removing: &BTreeMap<String, &ListingManifest>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    for manifest in changing.values() {
        for (dependency, requirement) in &manifest.dependencies {
            let provider = changing.get(dependency).or_else(|| remaining.get(dependency));
            match provider {
                Some(provider) if requirement.matches(&provider.version) => {}
                Some(provider) => warnings.push(format!(
                    "'{}' requires '{}' {} but {} would be present",
                    manifest.id, dependency, requirement, provider.version
                )),
                None if removing.contains_key(dependency) => warnings.push(format!(
                    "'{}' depends on '{}', which is selected for uninstall",
                    manifest.id, dependency
                )),
                None => warnings.push(format!(
                    "'{}' depends on '{}' {}, which is neither selected nor installed",
                    manifest.id, dependency, requirement
                )),
            }
        }
    }
    warnings
}

fn removal_warnings(
    remaining: &BTreeMap<String, &ListingManifest>,
    removing: &BTreeMap<String, &ListingManifest>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    for (id, manifest) in remaining {
        let broken: BTreeSet<&String> = manifest
            .dependencies
            .keys()
            .filter(|dependency| removing.contains_key(*dependency))
            .collect();
        for dependency in broken {
            warnings.push(format!(
                "installed '{}' depends on '{}', which is selected for uninstall",
                id, dependency
            ));
        }
    }
    warnings
}

fn listing_by_id<'a>(model: &'a SelectionModel, id: &str) -> Option<&'a ListingRef> {
    model.item_to_operation().keys().find(|item| item.id() == id)
}

fn plan_step(
    model: &SelectionModel,
    item: &ListingRef,
    changing: &BTreeMap<String, &ListingManifest>,
    removing: &BTreeMap<String, &ListingManifest>,
) -> PlanStep {
    let version = changing
        .get(item.id())
        .or_else(|| removing.get(item.id()))
        .map(|manifest| manifest.version.clone())
        .unwrap_or_else(|| item.manifest().version.clone());
    let features = model
        .feature_entries(item.id())
        .into_iter()
        .filter(|entry| entry.is_checked())
        .map(|entry| entry.descriptor().id().to_string())
        .collect();
    PlanStep {
        id: item.id().to_string(),
        name: item.name().to_string(),
        operation: model.operation_for(item),
        version,
        features,
    }
}
