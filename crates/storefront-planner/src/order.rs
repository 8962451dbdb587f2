use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{anyhow, Result};
use storefront_core::ListingManifest;

/// Orders listings so that every listing comes after the listings it depends
/// on. Dependencies outside `selected` are ignored; ties break by id.
pub(crate) fn dependency_order(selected: &BTreeMap<String, &ListingManifest>) -> Result<Vec<String>> {
    let mut reverse: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();

    for (id, manifest) in selected {
        let degree = manifest
            .dependencies
            .keys()
            .filter(|dependency| selected.contains_key(*dependency))
            .inspect(|dependency| {
                reverse
                    .entry(dependency.as_str())
                    .or_default()
                    .insert(id.as_str());
            })
            .count();
        in_degree.insert(id.as_str(), degree);
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter_map(|(id, degree)| (*degree == 0).then_some(*id))
        .collect();
    let mut ordered = Vec::new();

    while let Some(next) = ready.pop_first() {
        ordered.push(next.to_string());
        for dependent in reverse.get(next).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if ordered.len() != selected.len() {
        let ordered_set: HashSet<&str> = ordered.iter().map(String::as_str).collect();
        let cycle_nodes = selected
            .keys()
            .filter(|id| !ordered_set.contains(id.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "dependency cycle detected involving: {}",
            cycle_nodes.join(", ")
        ));
    }

    Ok(ordered)
}
