use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use storefront_catalog::{CancellationToken, ListingResolver};
use storefront_core::{ListingRef, Operation};

use crate::model::{listing_is_present, SelectionModel};

static TOKEN_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\s=]+)=(\S+)$").expect("token segment pattern is valid"));

/// Encodes the selection as space-separated `id=OPERATION` pairs, ordered by
/// listing id.
pub fn serialize(model: &SelectionModel) -> String {
    model
        .item_to_operation()
        .iter()
        .filter(|(_, operation)| !operation.is_none())
        .map(|(item, operation)| format!("{}={}", item.id(), operation.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn encode_for_url(token: &str) -> String {
    urlencoding::encode(token).into_owned()
}

pub fn decode_from_url(param: &str) -> Result<String> {
    urlencoding::decode(param)
        .map(|decoded| decoded.into_owned())
        .context("selection token is not valid percent-encoded UTF-8")
}

/// Token contents before any catalog lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedSelection {
    operations: BTreeMap<String, Operation>,
}

impl DecodedSelection {
    /// Lenient parse: segments that do not look like `id=NAME` are skipped,
    /// unknown operation names decode as `None`.
    pub fn parse(token: &str) -> Self {
        let mut operations = BTreeMap::new();
        for segment in token.split_whitespace() {
            let Some(captures) = TOKEN_SEGMENT.captures(segment) else {
                tracing::debug!("skipping malformed selection segment '{}'", segment);
                continue;
            };
            let id = captures[1].to_string();
            let operation = Operation::parse(&captures[2]).unwrap_or_else(|| {
                tracing::debug!(
                    "unknown operation '{}' for listing '{}'",
                    &captures[2],
                    id
                );
                Operation::None
            });
            operations.insert(id, operation);
        }
        Self { operations }
    }

    /// Overrides win on key collision.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, Operation>) -> Self {
        for (id, operation) in overrides {
            self.operations.insert(id.clone(), *operation);
        }
        self
    }

    pub fn operations(&self) -> &BTreeMap<String, Operation> {
        &self.operations
    }

    pub fn listing_ids(&self) -> BTreeSet<String> {
        self.operations.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The catalog has no listing with this id.
    NotFound,
    /// The model did not take the operation (e.g. `NONE` or an unknown name).
    Rejected,
    /// Update requested for a listing with nothing installed.
    NotInstalled,
}

impl UnavailableReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Rejected => "rejected",
            Self::NotInstalled => "not installed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnavailableItem {
    pub id: String,
    pub name: Option<String>,
    pub operation: Operation,
    pub reason: UnavailableReason,
}

/// Restores a selection from a token and records what could not be restored.
#[derive(Debug, Clone, Default)]
pub struct SelectionStateSerializer {
    unavailable: Vec<UnavailableItem>,
}

impl SelectionStateSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serialize(&self, model: &SelectionModel) -> String {
        serialize(model)
    }

    /// Parses `token`, lays `extra_overrides` over it, resolves every id in
    /// one batch and applies the result. A resolver failure (including
    /// cancellation) returns an error and leaves the model untouched.
    pub fn deserialize(
        &mut self,
        model: &mut SelectionModel,
        token: &str,
        extra_overrides: &BTreeMap<String, Operation>,
        resolver: &dyn ListingResolver,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let decoded = DecodedSelection::parse(token).with_overrides(extra_overrides);
        let resolved = if decoded.is_empty() {
            BTreeMap::new()
        } else {
            resolver
                .resolve_listings(&decoded.listing_ids(), cancel)
                .context("failed to resolve listings named by the selection token")?
        };
        self.apply(model, &decoded, &resolved, resolver);
        Ok(())
    }

    /// Applies already-resolved listings to the model. This is the part that
    /// runs on the owning thread when resolution happened in the background.
    pub fn apply(
        &mut self,
        model: &mut SelectionModel,
        decoded: &DecodedSelection,
        resolved: &BTreeMap<String, ListingRef>,
        resolver: &dyn ListingResolver,
    ) {
        self.unavailable.clear();
        for (id, requested) in decoded.operations() {
            let Some(listing) = resolved.get(id) else {
                self.record(id, None, *requested, UnavailableReason::NotFound);
                continue;
            };

            let mut operation = *requested;
            if operation == Operation::Install && resolver.is_installed(listing) {
                tracing::debug!("'{}' is already installed; selecting update", id);
                operation = Operation::Update;
            }
            if operation == Operation::Update && !listing_is_present(listing, resolver) {
                self.record(
                    id,
                    Some(listing),
                    operation,
                    UnavailableReason::NotInstalled,
                );
                continue;
            }

            model.select(listing, operation);
            if model.operation_for(listing).is_none() {
                self.record(id, Some(listing), operation, UnavailableReason::Rejected);
            } else {
                tracing::info!("restored {} for '{}'", operation, id);
            }
        }
    }

    pub fn has_unavailable_items(&self) -> bool {
        !self.unavailable.is_empty()
    }

    pub fn unavailable_items(&self) -> &[UnavailableItem] {
        &self.unavailable
    }

    fn record(
        &mut self,
        id: &str,
        listing: Option<&ListingRef>,
        operation: Operation,
        reason: UnavailableReason,
    ) {
        tracing::warn!(
            "selection for '{}' is unavailable: {}",
            id,
            reason.as_str()
        );
        self.unavailable.push(UnavailableItem {
            id: id.to_string(),
            name: listing.map(|listing| listing.name().to_string()),
            operation,
            reason,
        });
    }
}
