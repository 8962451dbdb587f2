mod index;
mod job;
mod layout;
mod local;
mod receipts;
mod resolver;

pub use index::CatalogIndex;
pub use job::{JobOutcome, ResolveJob};
pub use layout::{default_storefront_home, StorefrontLayout};
pub use local::LocalCatalog;
pub use receipts::{read_install_receipts, write_install_receipt, InstallReceipt};
pub use resolver::{CancellationToken, ListingResolver};
