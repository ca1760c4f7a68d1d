//! The unified read/write session joining the blob store and the
//! catalog (spec.md §4.D).

use std::cell::RefCell;
use std::io::Read;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::blob::{Blob, Package};
use crate::catalog;
use crate::error::SunburstError;
use crate::hash::Hash;
use crate::identity::{PackageIdentifier, Path};
use crate::store::{BlobStore, FsBlobStore};
use crate::strings::Strings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Committed,
    RolledBack,
    Closed,
}

/// One concurrency unit: exactly one underlying connection with
/// auto-commit disabled, state machine `Open → (Commit | Rollback |
/// Close) → Done` (spec.md §4.D).
///
/// Borrows the [`Inventory`](crate::inventory::Inventory)'s connection
/// rather than owning it, so the inventory can hand out a fresh
/// transaction again once this one ends.
pub struct Transaction<'a> {
    connection: &'a mut Connection,
    store: &'a FsBlobStore,
    strings: &'a dyn Strings,
    state: State,
    /// Hashes [`Self::add_blob`] committed to disk *for the first time*
    /// during this transaction's lifetime (i.e. the `.b` file did not
    /// already exist). The filesystem write is not covered by the SQL
    /// transaction's own atomicity, so if this transaction ends without
    /// committing, these files must be removed by hand to uphold
    /// invariant I6 ("a rollback leaves neither catalog rows nor new
    /// blob files").
    newly_written_blobs: RefCell<Vec<Hash>>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(connection: &'a mut Connection, store: &'a FsBlobStore, strings: &'a dyn Strings) -> Result<Self, SunburstError> {
        connection.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self {
            connection,
            store,
            strings,
            state: State::Open,
            newly_written_blobs: RefCell::new(Vec::new()),
        })
    }

    /// The [`Strings`] collaborator this transaction's inventory was
    /// opened with (spec.md §1).
    pub fn strings(&self) -> &dyn Strings {
        self.strings
    }

    fn require_open(&self, op: &str) -> Result<(), SunburstError> {
        if self.state != State::Open {
            return Err(SunburstError::invalid_state(op));
        }
        Ok(())
    }

    /// Runs [`FsBlobStore::write_blob`], then records the blob row
    /// idempotently (`ON CONFLICT DO NOTHING`). If this call is the one
    /// that creates the `.b` file (it did not already exist), the hash
    /// is remembered so a later rollback/close can delete it again.
    #[tracing::instrument(level = "debug", skip(self, stream))]
    pub fn add_blob<R: Read>(&self, blob: &Blob, stream: R) -> Result<(), SunburstError> {
        self.require_open("addBlob")?;
        let already_on_disk = self.store.path_of(&blob.hash).exists();
        self.store.write_blob(blob, stream)?;
        catalog::insert_blob_if_absent(&self.connection, blob)?;
        if !already_on_disk {
            self.newly_written_blobs.borrow_mut().push(blob.hash.clone());
        }
        Ok(())
    }

    /// Deletes every blob file this transaction newly wrote via
    /// [`Self::add_blob`] and that was never committed. Called from
    /// every exit path that does not end in [`Self::commit`].
    fn discard_new_blobs(&self) {
        for hash in self.newly_written_blobs.borrow_mut().drain(..) {
            if let Err(err) = self.store.delete_blob(&hash) {
                tracing::warn!(%err, %hash, "failed to remove an orphaned blob file after rollback");
            }
        }
    }

    /// Deletes the blob row; on an `ON DELETE RESTRICT` violation,
    /// surfaces `error-blob-referenced` and leaves the file in place.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn remove_blob(&self, hash: &Hash) -> Result<(), SunburstError> {
        self.require_open("removeBlob")?;
        match catalog::delete_blob_row(&self.connection, hash) {
            Ok(()) => {}
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
                return Err(SunburstError::blob_referenced(hash));
            }
            Err(err) => return Err(err.into()),
        }
        self.store.delete_blob(hash)?;
        Ok(())
    }

    /// Puts `package` into the catalog (spec.md §4.D `putPackage`):
    /// resolve blob hashes, then insert-or-snapshot-replace.
    #[tracing::instrument(level = "debug", skip(self, package), fields(identifier = %package.identifier))]
    pub fn put_package(&self, package: &Package, now: DateTime<Utc>) -> Result<(), SunburstError> {
        self.require_open("putPackage")?;

        let mut blob_ids = Vec::with_capacity(package.entries.len());
        let mut missing = Vec::new();
        for entry in package.entries.values() {
            match catalog::blob_id_by_hash(&self.connection, &entry.blob.hash)? {
                Some(id) => blob_ids.push((entry.path.clone(), id)),
                None => missing.push(entry.blob.hash.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(SunburstError::package_missing_blobs(&package.identifier, &missing));
        }

        let package_id = match catalog::package_id_by_identifier(&self.connection, &package.identifier)? {
            Some(existing_id) => {
                if !package.identifier.version.is_snapshot() {
                    return Err(SunburstError::package_duplicate(&package.identifier));
                }
                catalog::touch_package_row(&self.connection, existing_id, now)?;
                catalog::clear_package_contents(&self.connection, existing_id)?;
                existing_id
            }
            None => catalog::insert_package_row(&self.connection, &package.identifier, now)?,
        };

        for (path, blob_id) in blob_ids {
            catalog::insert_package_entry(&self.connection, package_id, blob_id, &path)?;
        }
        for (key, value) in &package.metadata {
            catalog::insert_package_meta(&self.connection, package_id, key, value)?;
        }
        Ok(())
    }

    /// Joins `blobs ⋈ package_blobs ⋈ packages` to find the on-disk
    /// path for `(identifier, path)`.
    pub fn blob_file(&self, identifier: &PackageIdentifier, path: &Path) -> Result<std::path::PathBuf, SunburstError> {
        self.require_open("blobFile")?;
        let package_id = catalog::package_id_by_identifier(&self.connection, identifier)?
            .ok_or_else(|| SunburstError::path_nonexistent(identifier, path))?;
        let hash = catalog::blob_hash_for_path(&self.connection, package_id, path)?
            .ok_or_else(|| SunburstError::path_nonexistent(identifier, path))?;
        Ok(self.store.path_of(&hash))
    }

    pub fn packages_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<PackageIdentifier>, SunburstError> {
        self.require_open("packagesUpdatedSince")?;
        catalog::packages_updated_since(&self.connection, since)
    }

    /// Blobs not referenced by any `package_blobs` row — the set safe
    /// to [`Self::remove_blob`] (P7).
    pub fn blobs_unreferenced(&self) -> Result<Vec<Blob>, SunburstError> {
        self.require_open("blobsUnreferenced")?;
        catalog::blobs_unreferenced(&self.connection)
    }

    pub fn packages(&self) -> Result<Vec<PackageIdentifier>, SunburstError> {
        self.require_open("packages")?;
        catalog::packages(&self.connection)
    }

    /// Reconstructs the full [`Package`] (entries and metadata included)
    /// stored under `identifier`, or `None` if no such package exists
    /// (spec.md §4.D: `packageGet` "follow[s] directly from the
    /// schema").
    pub fn package_get(&self, identifier: &PackageIdentifier) -> Result<Option<Package>, SunburstError> {
        self.require_open("packageGet")?;
        catalog::package_get(&self.connection, identifier)
    }

    pub fn blob_get(&self, hash: &Hash) -> Result<Option<Blob>, SunburstError> {
        self.require_open("blobGet")?;
        catalog::blob_get(&self.connection, hash)
    }

    pub fn blob_list(&self) -> Result<Vec<Blob>, SunburstError> {
        self.require_open("blobList")?;
        catalog::blob_list(&self.connection)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn commit(mut self) -> Result<(), SunburstError> {
        self.require_open("commit")?;
        self.connection.execute_batch("COMMIT")?;
        self.state = State::Committed;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback(mut self) -> Result<(), SunburstError> {
        self.require_open("rollback")?;
        self.connection.execute_batch("ROLLBACK")?;
        self.state = State::RolledBack;
        self.discard_new_blobs();
        Ok(())
    }

    /// `close()` implies rollback if still open; a no-op after
    /// `commit`/`rollback` (spec.md §4.D).
    pub fn close(mut self) -> Result<(), SunburstError> {
        self.close_mut()
    }

    fn close_mut(&mut self) -> Result<(), SunburstError> {
        if self.state == State::Open {
            self.connection.execute_batch("ROLLBACK")?;
            self.state = State::RolledBack;
            self.discard_new_blobs();
        }
        self.state = State::Closed;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == State::Open {
            if let Err(err) = self.connection.execute_batch("ROLLBACK") {
                tracing::warn!(%err, "rollback-on-drop failed for an open transaction");
            }
            self.state = State::RolledBack;
            self.discard_new_blobs();
        }
    }
}
