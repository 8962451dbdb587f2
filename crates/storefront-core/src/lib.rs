mod feature;
mod listing;
mod operation;
mod status;

pub use feature::{FeatureDescriptor, FEATURE_GROUP_SUFFIX};
pub use listing::{is_token_safe_id, ListingFeature, ListingManifest, ListingRef};
pub use operation::Operation;
pub use status::{Severity, Status};
