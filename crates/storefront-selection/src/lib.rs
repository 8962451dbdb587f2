//! Selection & operation model for marketplace listings.
//!
//! [`SelectionModel`] stores which [`Operation`](storefront_core::Operation)
//! the user picked per listing and derives the listing/feature entry tree.
//! [`ButtonStateController`] drives the per-listing action control on top of
//! it, and [`SelectionStateSerializer`] turns the selection into a compact
//! `id=OPERATION` token and back.

mod button;
mod entry;
mod model;
mod serializer;
mod viability;

pub use button::{ButtonPresentation, ButtonState, ButtonStateController, FontStyle};
pub use entry::{CatalogItemEntry, FeatureEntry, FeatureKey, SelectionNode};
pub use model::SelectionModel;
pub use serializer::{
    decode_from_url, encode_for_url, serialize, DecodedSelection, SelectionStateSerializer,
    UnavailableItem, UnavailableReason,
};
pub use viability::Viability;

#[cfg(test)]
mod tests;
