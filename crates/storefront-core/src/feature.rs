use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub const FEATURE_GROUP_SUFFIX: &str = ".feature.group";

/// Identity and display metadata for one installable unit of a listing.
///
/// Two descriptors are equal iff their ids match. A descriptor is never
/// mutated in place; richer metadata replaces it wholesale via
/// [`FeatureDescriptor::replace_with`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    id: String,
    simple_id: String,
    name: String,
}

impl FeatureDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            simple_id: simple_id_for(&id),
            name: name.into(),
            id,
        }
    }

    /// Descriptor for a unit id nothing is known about yet; the id doubles
    /// as the display name.
    pub fn from_unit_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn simple_id(&self) -> &str {
        &self.simple_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_fallback_name(&self) -> bool {
        self.name == self.id
    }

    /// Swaps in `replacement`. Panics when the ids differ: that is caller
    /// misuse, never user input.
    pub fn replace_with(&mut self, replacement: FeatureDescriptor) {
        assert_eq!(
            self.id, replacement.id,
            "feature descriptor replacement must keep id '{}'",
            self.id
        );
        *self = replacement;
    }
}

impl PartialEq for FeatureDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FeatureDescriptor {}

impl Hash for FeatureDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for FeatureDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FeatureDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

fn simple_id_for(id: &str) -> String {
    id.strip_suffix(FEATURE_GROUP_SUFFIX)
        .filter(|stripped| !stripped.is_empty())
        .unwrap_or(id)
        .to_string()
}
