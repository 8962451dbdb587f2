use std::collections::BTreeMap;

use storefront_core::ListingManifest;

/// Conflicts among the listings being installed or changed, and between
/// those and the installed listings that stay. One message per pair.
pub(crate) fn conflict_details(
    changing: &BTreeMap<String, &ListingManifest>,
    remaining: &BTreeMap<String, &ListingManifest>,
) -> Vec<String> {
    let mut details = Vec::new();

    let changing_manifests: Vec<&ListingManifest> = changing.values().copied().collect();
    for (index, left) in changing_manifests.iter().enumerate() {
        for right in changing_manifests.iter().skip(index + 1) {
            if manifests_conflict(left, right) {
                details.push(format!(
                    "'{}' {} conflicts with '{}' {}, both selected",
                    left.id, left.version, right.id, right.version
                ));
            }
        }
    }

    for selected in changing.values() {
        for (installed_id, installed) in remaining {
            if changing.contains_key(installed_id) {
                continue;
            }
            if manifests_conflict(selected, installed) {
                details.push(format!(
                    "'{}' {} conflicts with installed '{}' {}",
                    selected.id, selected.version, installed.id, installed.version
                ));
            }
        }
    }

    details
}

fn manifests_conflict(left: &ListingManifest, right: &ListingManifest) -> bool {
    left.conflicts
        .get(&right.id)
        .map(|req| req.matches(&right.version))
        .unwrap_or(false)
        || right
            .conflicts
            .get(&left.id)
            .map(|req| req.matches(&left.version))
            .unwrap_or(false)
}
