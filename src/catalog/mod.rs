//! The relational catalog (spec.md §4.C).
//!
//! Row-level persistence only; transactional orchestration (resolving
//! blob hashes to ids, snapshot-replace-vs-duplicate-reject logic) lives
//! in [`crate::transaction`]. Every connection this module opens has
//! `PRAGMA foreign_keys = ON` set explicitly, since SQLite does not
//! enable foreign-key enforcement by default (spec.md §4.C).

pub mod schema;

use std::collections::BTreeMap;
use std::path::Path as FsPath;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::blob::{Blob, Package, PackageEntry};
use crate::error::SunburstError;
use crate::hash::{Hash, HashAlgorithm};
use crate::identity::{PackageIdentifier, Path, Version};
use schema::MigrationStrategy;

/// Opens the catalog database at `<base>/sunburst.db`, enables foreign
/// keys, and runs migrations per `strategy`.
pub fn open(db_path: &FsPath, read_only: bool, strategy: MigrationStrategy) -> Result<Connection, SunburstError> {
    let conn = if read_only {
        let flags = rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
            | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX
            | rusqlite::OpenFlags::SQLITE_OPEN_URI;
        Connection::open_with_flags(db_path, flags)?
    } else {
        Connection::open(db_path)?
    };
    conn.pragma_update(None, "foreign_keys", true)?;
    schema::migrate(&conn, strategy)?;
    Ok(conn)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRow {
    pub id: i64,
    pub blob: Blob,
}

fn row_to_blob(id: i64, algorithm: String, hash_hex: String, size: i64, content_type: String) -> Result<BlobRow, SunburstError> {
    let algorithm = match algorithm.as_str() {
        "SHA2_256" => HashAlgorithm::Sha2_256,
        other => {
            return Err(SunburstError::new(
                crate::error::SunburstErrorKind::Db,
                format!("unknown hash algorithm `{other}` stored in catalog"),
            ))
        }
    };
    let hash = Hash::new(algorithm, hex::decode(&hash_hex)?)?;
    Ok(BlobRow {
        id,
        blob: Blob::new(size as u64, content_type, hash),
    })
}

/// Inserts `blob` if absent (`ON CONFLICT (hash_algorithm, hash) DO
/// NOTHING` — re-adding the same blob is idempotent, spec.md §4.D
/// `addBlob`). Returns the row id either way.
pub fn insert_blob_if_absent(conn: &Connection, blob: &Blob) -> Result<i64, SunburstError> {
    conn.execute(
        "INSERT INTO blobs (hash_algorithm, hash, size, content_type)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (hash_algorithm, hash) DO NOTHING",
        params![blob.hash.algorithm().text(), blob.hash.to_hex(), blob.size as i64, blob.content_type],
    )?;
    blob_id_by_hash(conn, &blob.hash)?.ok_or_else(|| {
        SunburstError::new(
            crate::error::SunburstErrorKind::Db,
            format!("blob {} missing immediately after insert", blob.hash),
        )
    })
}

pub fn blob_id_by_hash(conn: &Connection, hash: &Hash) -> Result<Option<i64>, SunburstError> {
    conn.query_row(
        "SELECT id FROM blobs WHERE hash_algorithm = ?1 AND hash = ?2",
        params![hash.algorithm().text(), hash.to_hex()],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn blob_get(conn: &Connection, hash: &Hash) -> Result<Option<Blob>, SunburstError> {
    let row: Option<(i64, String, String, i64, String)> = conn
        .query_row(
            "SELECT id, hash_algorithm, hash, size, content_type FROM blobs WHERE hash_algorithm = ?1 AND hash = ?2",
            params![hash.algorithm().text(), hash.to_hex()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .optional()?;
    row.map(|(id, algo, hex_hash, size, content_type)| row_to_blob(id, algo, hex_hash, size, content_type).map(|row| row.blob))
        .transpose()
}

pub fn blob_list(conn: &Connection) -> Result<Vec<Blob>, SunburstError> {
    let mut stmt = conn.prepare("SELECT id, hash_algorithm, hash, size, content_type FROM blobs ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)))?
        .collect::<Result<Vec<(i64, String, String, i64, String)>, rusqlite::Error>>()?;
    rows.into_iter()
        .map(|(id, algo, hex_hash, size, content_type)| row_to_blob(id, algo, hex_hash, size, content_type).map(|row| row.blob))
        .collect()
}

/// Blobs not referenced by any `package_blobs` row (spec.md §4.D
/// `blobsUnreferenced`, P7).
pub fn blobs_unreferenced(conn: &Connection) -> Result<Vec<Blob>, SunburstError> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.hash_algorithm, b.hash, b.size, b.content_type
         FROM blobs b
         WHERE NOT EXISTS (SELECT 1 FROM package_blobs pb WHERE pb.blob_id = b.id)
         ORDER BY b.id",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)))?
        .collect::<Result<Vec<(i64, String, String, i64, String)>, rusqlite::Error>>()?;
    rows.into_iter()
        .map(|(id, algo, hex_hash, size, content_type)| row_to_blob(id, algo, hex_hash, size, content_type).map(|row| row.blob))
        .collect()
}

/// Deletes the blob row for `hash`. Fails with a foreign-key
/// `rusqlite::Error` if a `package_blobs` row still references it
/// (`ON DELETE RESTRICT`, invariant I4); the caller maps that into
/// `error-blob-referenced` (spec.md §4.D `removeBlob`).
pub fn delete_blob_row(conn: &Connection, hash: &Hash) -> Result<(), rusqlite::Error> {
    conn.execute(
        "DELETE FROM blobs WHERE hash_algorithm = ?1 AND hash = ?2",
        params![hash.algorithm().text(), hash.to_hex()],
    )?;
    Ok(())
}

pub fn package_id_by_identifier(conn: &Connection, identifier: &PackageIdentifier) -> Result<Option<i64>, SunburstError> {
    conn.query_row(
        "SELECT id FROM packages
         WHERE name = ?1 AND version_major = ?2 AND version_minor = ?3
           AND version_patch = ?4 AND version_qualifier = ?5",
        params![
            identifier.name.as_str(),
            identifier.version.major,
            identifier.version.minor,
            identifier.version.patch,
            identifier.version.qualifier.as_deref().unwrap_or(""),
        ],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn insert_package_row(conn: &Connection, identifier: &PackageIdentifier, updated: DateTime<Utc>) -> Result<i64, SunburstError> {
    conn.execute(
        "INSERT INTO packages (name, version_major, version_minor, version_patch, version_qualifier, updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            identifier.name.as_str(),
            identifier.version.major,
            identifier.version.minor,
            identifier.version.patch,
            identifier.version.qualifier.as_deref().unwrap_or(""),
            updated.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn touch_package_row(conn: &Connection, package_id: i64, updated: DateTime<Utc>) -> Result<(), SunburstError> {
    conn.execute(
        "UPDATE packages SET updated = ?1 WHERE id = ?2",
        params![updated.to_rfc3339(), package_id],
    )?;
    Ok(())
}

pub fn clear_package_contents(conn: &Connection, package_id: i64) -> Result<(), SunburstError> {
    conn.execute("DELETE FROM package_blobs WHERE package_id = ?1", params![package_id])?;
    conn.execute("DELETE FROM package_meta WHERE package_id = ?1", params![package_id])?;
    Ok(())
}

pub fn insert_package_entry(conn: &Connection, package_id: i64, blob_id: i64, path: &Path) -> Result<(), SunburstError> {
    conn.execute(
        "INSERT INTO package_blobs (package_id, blob_id, path) VALUES (?1, ?2, ?3)",
        params![package_id, blob_id, path.to_string()],
    )?;
    Ok(())
}

pub fn insert_package_meta(conn: &Connection, package_id: i64, key: &str, value: &str) -> Result<(), SunburstError> {
    conn.execute(
        "INSERT INTO package_meta (package_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
        params![package_id, key, value],
    )?;
    Ok(())
}

pub fn packages_updated_since(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<PackageIdentifier>, SunburstError> {
    let mut stmt = conn.prepare(
        "SELECT name, version_major, version_minor, version_patch, version_qualifier
         FROM packages WHERE updated > ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![since.to_rfc3339()], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get::<_, String>(4)?))
        })?
        .collect::<Result<Vec<(String, u32, u32, u32, String)>, rusqlite::Error>>()?;

    rows.into_iter()
        .map(|(name, major, minor, patch, qualifier)| to_identifier(name, major, minor, patch, qualifier))
        .collect()
}

pub fn packages(conn: &Connection) -> Result<Vec<PackageIdentifier>, SunburstError> {
    let mut stmt = conn.prepare(
        "SELECT name, version_major, version_minor, version_patch, version_qualifier FROM packages ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get::<_, String>(4)?))
        })?
        .collect::<Result<Vec<(String, u32, u32, u32, String)>, rusqlite::Error>>()?;

    rows.into_iter()
        .map(|(name, major, minor, patch, qualifier)| to_identifier(name, major, minor, patch, qualifier))
        .collect()
}

fn to_identifier(name: String, major: u32, minor: u32, patch: u32, qualifier: String) -> Result<PackageIdentifier, SunburstError> {
    let qualifier = if qualifier.is_empty() { None } else { Some(qualifier) };
    Ok(PackageIdentifier::new(
        crate::identity::PackageName::parse(&name)?,
        Version::new(major, minor, patch, qualifier)?,
    ))
}

/// Resolves `(identifier, path)` to the blob hash filed under it, for
/// [`crate::transaction::Transaction::blob_file`].
pub fn blob_hash_for_path(conn: &Connection, package_id: i64, path: &Path) -> Result<Option<Hash>, SunburstError> {
    conn.query_row(
        "SELECT b.hash_algorithm, b.hash
         FROM package_blobs pb JOIN blobs b ON b.id = pb.blob_id
         WHERE pb.package_id = ?1 AND pb.path = ?2",
        params![package_id, path.to_string()],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )
    .optional()?
    .map(|(algo, hex_hash)| {
        let algorithm = match algo.as_str() {
            "SHA2_256" => HashAlgorithm::Sha2_256,
            other => {
                return Err(SunburstError::new(
                    crate::error::SunburstErrorKind::Db,
                    format!("unknown hash algorithm `{other}` stored in catalog"),
                ))
            }
        };
        Ok(Hash::new(algorithm, hex::decode(&hex_hash)?)?)
    })
    .transpose()
}

/// Every `(path, blob)` entry filed under `package_id`, keyed by path
/// (spec.md §3 `Package.entries`).
fn package_entries(conn: &Connection, package_id: i64) -> Result<BTreeMap<Path, PackageEntry>, SunburstError> {
    let mut stmt = conn.prepare(
        "SELECT pb.path, b.id, b.hash_algorithm, b.hash, b.size, b.content_type
         FROM package_blobs pb JOIN blobs b ON b.id = pb.blob_id
         WHERE pb.package_id = ?1
         ORDER BY pb.path",
    )?;
    let rows = stmt
        .query_map(params![package_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<(String, i64, String, String, i64, String)>, rusqlite::Error>>()?;

    let mut entries = BTreeMap::new();
    for (path_text, blob_id, algo, hex_hash, size, content_type) in rows {
        let path = Path::parse(&path_text)?;
        let blob = row_to_blob(blob_id, algo, hex_hash, size, content_type)?.blob;
        entries.insert(path.clone(), PackageEntry::new(path, blob));
    }
    Ok(entries)
}

/// Every `meta_key → meta_value` row filed under `package_id` (spec.md
/// §3 `Package.metadata`).
fn package_meta(conn: &Connection, package_id: i64) -> Result<BTreeMap<String, String>, SunburstError> {
    let mut stmt = conn.prepare("SELECT meta_key, meta_value FROM package_meta WHERE package_id = ?1 ORDER BY meta_key")?;
    let rows = stmt
        .query_map(params![package_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<(String, String)>, rusqlite::Error>>()?;
    Ok(rows.into_iter().collect())
}

/// Reconstructs the full [`Package`] stored under `identifier` — joins
/// `packages` to `package_blobs`/`blobs` and `package_meta`, rather than
/// the identifier-only existence check a caller could do with
/// `package_id_by_identifier` alone (spec.md §4.D `packageGet`).
pub fn package_get(conn: &Connection, identifier: &PackageIdentifier) -> Result<Option<Package>, SunburstError> {
    let package_id = match package_id_by_identifier(conn, identifier)? {
        Some(id) => id,
        None => return Ok(None),
    };
    let entries = package_entries(conn, package_id)?;
    let metadata = package_meta(conn, package_id)?;
    Ok(Some(Package {
        identifier: identifier.clone(),
        metadata,
        entries,
    }))
}
