//! Sunburst: a content-addressed inventory of binary blobs bound to a
//! relational catalog of named, versioned packages, plus a runtime
//! resolver that lets independently-deployed peers request the files
//! of packages they import.
//!
//! See `DESIGN.md` for how each module is grounded and why.

pub mod blob;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hash;
pub mod identity;
pub mod inventory;
pub mod runtime;
pub mod store;
pub mod strings;
pub mod transaction;

pub use blob::{Blob, Package, PackageEntry, Peer};
pub use config::InventoryConfig;
pub use error::{SunburstError, SunburstErrorKind};
pub use hash::{Hash, HashAlgorithm};
pub use identity::{PackageIdentifier, PackageName, Path, Version};
pub use inventory::Inventory;
pub use runtime::RuntimeContext;
pub use store::{BlobStore, FsBlobStore};
pub use strings::{PlainStrings, Strings};
pub use transaction::Transaction;
