//! Blobs, package entries, packages, and peers (spec.md §3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::identity::{PackageIdentifier, Path, Version};

/// `(size, contentType, hash)`. A blob is identified solely by its
/// hash; `size` and `content_type` are advisory metadata that the blob
/// store and catalog also verify when present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blob {
    pub size: u64,
    pub content_type: String,
    pub hash: Hash,
}

impl Blob {
    pub fn new(size: u64, content_type: impl Into<String>, hash: Hash) -> Self {
        Self {
            size,
            content_type: content_type.into(),
            hash,
        }
    }
}

/// `(path, blob)`. Path is unique within a package (enforced by the
/// catalog's `UNIQUE(package_id, path)` constraint, invariant I2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub path: Path,
    pub blob: Blob,
}

impl PackageEntry {
    pub fn new(path: Path, blob: Blob) -> Self {
        Self { path, blob }
    }
}

/// `(identifier, metadata, entries)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub identifier: PackageIdentifier,
    pub metadata: BTreeMap<String, String>,
    pub entries: BTreeMap<Path, PackageEntry>,
}

impl Package {
    pub fn new(identifier: PackageIdentifier) -> Self {
        Self {
            identifier,
            metadata: BTreeMap::new(),
            entries: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, entry: PackageEntry) -> Self {
        self.entries.insert(entry.path.clone(), entry);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// `(packageName, imports)`. At most one version per imported package
/// name (the `BTreeMap` key is the name, so this is enforced by
/// construction rather than needing a separate check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub package_name: String,
    pub imports: BTreeMap<String, Version>,
}

impl Peer {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            imports: BTreeMap::new(),
        }
    }

    pub fn with_import(mut self, name: impl Into<String>, version: Version) -> Self {
        self.imports.insert(name.into(), version);
        self
    }
}
