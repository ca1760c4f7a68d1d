//! Schema definition and versioned migrations (spec.md §4.C).
//!
//! Follows the `schema_version` table / `apply_migration(conn, version)`
//! pattern common to SQLite-backed catalogs in the retrieval corpus
//! (closest concrete precedent: `ConaryLabs-conary`'s `db::schema`).

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{SunburstError, SunburstErrorKind};

/// The schema version this binary expects on disk.
pub const SCHEMA_VERSION: i64 = 1;

/// How to treat a database whose on-disk schema is older than
/// [`SCHEMA_VERSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStrategy {
    /// Apply every pending migration (spec.md §4.E `openReadWrite`).
    Upgrade,
    /// Refuse to open (spec.md §4.E `openReadOnly`).
    FailInsteadOfUpgrading,
}

fn current_version(conn: &Connection) -> Result<i64, SunburstError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version_number INTEGER NOT NULL)",
        [],
    )?;
    let version = conn
        .query_row("SELECT version_number FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);
    Ok(version)
}

fn set_version(conn: &Connection, version: i64) -> Result<(), SunburstError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version_number) VALUES (?1)", [version])?;
    Ok(())
}

/// Brings the database up to [`SCHEMA_VERSION`], or fails if
/// `strategy` is [`MigrationStrategy::FailInsteadOfUpgrading`] and the
/// on-disk schema is behind.
pub fn migrate(conn: &Connection, strategy: MigrationStrategy) -> Result<(), SunburstError> {
    let version = current_version(conn)?;
    info!(version, target = SCHEMA_VERSION, "checking catalog schema version");

    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    if strategy == MigrationStrategy::FailInsteadOfUpgrading {
        return Err(SunburstError::new(
            SunburstErrorKind::Db,
            format!("catalog schema is at version {version}, need {SCHEMA_VERSION}, but this inventory was opened read-only"),
        ));
    }

    for next in (version + 1)..=SCHEMA_VERSION {
        debug!(version = next, "applying catalog migration");
        apply_migration(conn, next)?;
        set_version(conn, next)?;
    }
    Ok(())
}

fn apply_migration(conn: &Connection, version: i64) -> Result<(), SunburstError> {
    match version {
        1 => migrate_v1(conn),
        other => Err(SunburstError::new(
            SunburstErrorKind::Db,
            format!("unknown catalog schema migration {other}"),
        )),
    }
}

/// Initial schema (spec.md §4.C): blobs, packages, and the two join
/// tables binding package entries and metadata to a package.
fn migrate_v1(conn: &Connection) -> Result<(), SunburstError> {
    conn.execute_batch(
        "
        CREATE TABLE blobs (
            id             INTEGER PRIMARY KEY,
            hash_algorithm TEXT NOT NULL,
            hash           TEXT NOT NULL,
            size           INTEGER NOT NULL,
            content_type   TEXT NOT NULL,
            UNIQUE(hash_algorithm, hash)
        );

        CREATE TABLE packages (
            id                INTEGER PRIMARY KEY,
            name              TEXT NOT NULL,
            version_major     INTEGER NOT NULL,
            version_minor     INTEGER NOT NULL,
            version_patch     INTEGER NOT NULL,
            version_qualifier TEXT NOT NULL,
            updated           TEXT NOT NULL,
            UNIQUE(name, version_major, version_minor, version_patch, version_qualifier)
        );

        CREATE TABLE package_blobs (
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            blob_id    INTEGER NOT NULL REFERENCES blobs(id) ON DELETE RESTRICT,
            path       TEXT NOT NULL,
            UNIQUE(package_id, path)
        );

        CREATE TABLE package_meta (
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            meta_key   TEXT NOT NULL,
            meta_value TEXT NOT NULL,
            UNIQUE(package_id, meta_key)
        );

        CREATE INDEX idx_package_blobs_blob_id ON package_blobs(blob_id);
        CREATE INDEX idx_packages_updated ON packages(updated);
        ",
    )?;
    Ok(())
}
