//! Inventory lifecycle: open, run migrations, hand out transactions
//! (spec.md §4.E).

use std::fs;
use std::sync::Arc;

use tracing::info;

use crate::catalog::{self, schema::MigrationStrategy};
use crate::config::InventoryConfig;
use crate::error::io_at;
use crate::error::SunburstError;
use crate::store::FsBlobStore;
use crate::strings::Strings;
use crate::transaction::Transaction;

/// The on-disk combination of catalog plus blob store (glossary). Owns
/// one [`rusqlite::Connection`] and a handle to the blob-store root.
///
/// The design forbids sharing a single `Inventory` across different
/// base directories (spec.md §9 "Global mutable state"); opening two
/// `Inventory` instances on the same base from one process is
/// permitted but uncoordinated — treat that as two independent
/// writers.
pub struct Inventory {
    connection: rusqlite::Connection,
    store: FsBlobStore,
    strings: Arc<dyn Strings>,
    read_only: bool,
}

impl Inventory {
    /// Opens `config.base()` for reading and writing: creates the base
    /// directory tree if absent, enables FK enforcement, and applies
    /// any pending migrations in a single transaction.
    #[tracing::instrument(level = "debug", skip(config))]
    pub fn open_read_write(config: &InventoryConfig) -> Result<Self, SunburstError> {
        fs::create_dir_all(config.base()).map_err(|err| io_at(config.base(), err))?;
        let connection = catalog::open(&config.database_path(), false, MigrationStrategy::Upgrade)?;
        let store = FsBlobStore::open(config.blob_root())?;
        info!(base = %config.base().display(), "opened inventory read-write");
        Ok(Self {
            connection,
            store,
            strings: config.strings_handle(),
            read_only: false,
        })
    }

    /// Opens `config.base()` read-only. Fails instead of upgrading if
    /// the on-disk schema is behind (spec.md §4.E).
    #[tracing::instrument(level = "debug", skip(config))]
    pub fn open_read_only(config: &InventoryConfig) -> Result<Self, SunburstError> {
        let connection = catalog::open(&config.database_path(), true, MigrationStrategy::FailInsteadOfUpgrading)?;
        let store = FsBlobStore::open(config.blob_root())?;
        info!(base = %config.base().display(), "opened inventory read-only");
        Ok(Self {
            connection,
            store,
            strings: config.strings_handle(),
            read_only: true,
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The [`Strings`] collaborator this inventory was opened with
    /// (spec.md §1), handed down to every [`Transaction`] it begins.
    pub fn strings(&self) -> &dyn Strings {
        self.strings.as_ref()
    }

    /// Begins a new [`Transaction`] over this inventory's connection.
    ///
    /// Per spec.md §9, the core models one connection per `Inventory`
    /// rather than a pool — callers that need concurrent transactions
    /// open multiple `Inventory` handles.
    pub fn begin(&mut self) -> Result<Transaction<'_>, SunburstError> {
        Transaction::begin(&mut self.connection, &self.store, self.strings.as_ref())
    }

    /// Releases all resources. Any in-flight transactions were
    /// independently closed already (spec.md §4.E `close`).
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;
    use crate::hash::{Hash, HashAlgorithm};
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn open_read_write_then_read_only_round_trips_a_blob() {
        let dir = TempDir::new().unwrap();
        let config = InventoryConfig::new(dir.path());

        let mut inventory = Inventory::open_read_write(&config).unwrap();
        let data = b"Hello.";
        let hash = Hash::of_bytes(HashAlgorithm::Sha2_256, data);
        let blob = Blob::new(data.len() as u64, "text/plain", hash.clone());

        let tx = inventory.begin().unwrap();
        tx.add_blob(&blob, Cursor::new(data)).unwrap();
        tx.commit().unwrap();

        let mut reader = Inventory::open_read_only(&config).unwrap();
        let tx = reader.begin().unwrap();
        let fetched = tx.blob_get(&hash).unwrap().unwrap();
        assert_eq!(fetched.hash, hash);
        tx.close().unwrap();
    }
}
