//! Stable, typed errors for the inventory core (spec.md §6.6, §7).

use std::fmt;

use thiserror::Error;

/// One of the stable textual error codes from spec.md §6.6.
///
/// Kept separate from [`SunburstError`] so that callers (and a future
/// CLI/XML layer) can match on a stable code without depending on the
/// exact message text, which may be rendered through a [`crate::Strings`]
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SunburstErrorKind {
    Io,
    Closing,
    Db,
    HashMismatch,
    PackageMissingBlobs,
    PackageDuplicate,
    BlobReferenced,
    PathNonexistent,
    PeerMissing,
    PeerImportMissing,
    PeerMisconfigured,
}

impl SunburstErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::Io => "error-io",
            Self::Closing => "error-closing",
            Self::Db => "error-db",
            Self::HashMismatch => "error-hash-mismatch",
            Self::PackageMissingBlobs => "error-package-missing-blobs",
            Self::PackageDuplicate => "error-package-duplicate",
            Self::BlobReferenced => "error-blob-referenced",
            Self::PathNonexistent => "error-path-nonexistent",
            Self::PeerMissing => "error-peer-missing",
            Self::PeerImportMissing => "error-peer-import-missing",
            Self::PeerMisconfigured => "error-peer-misconfigured",
        }
    }
}

impl fmt::Display for SunburstErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A tagged error: `(kind, message, cause?, extra?)` per spec.md §7.
#[derive(Error, Debug)]
pub struct SunburstError {
    kind: SunburstErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
}

impl fmt::Display for SunburstError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl SunburstError {
    pub fn new(kind: SunburstErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> SunburstErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn path_nonexistent(identifier: impl fmt::Display, path: impl fmt::Display) -> Self {
        Self::new(
            SunburstErrorKind::PathNonexistent,
            format!("no entry at path {path} in package {identifier}"),
        )
    }

    pub(crate) fn hash_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::new(
            SunburstErrorKind::HashMismatch,
            format!("expected hash {expected} but stream produced {actual}"),
        )
    }

    pub(crate) fn package_duplicate(identifier: impl fmt::Display) -> Self {
        Self::new(
            SunburstErrorKind::PackageDuplicate,
            format!("package {identifier} already exists and is not a snapshot"),
        )
    }

    pub(crate) fn package_missing_blobs(identifier: impl fmt::Display, missing: &[String]) -> Self {
        Self::new(
            SunburstErrorKind::PackageMissingBlobs,
            format!(
                "package {identifier} references blobs not present in the catalog: {}",
                missing.join(", ")
            ),
        )
    }

    pub(crate) fn blob_referenced(hash: impl fmt::Display) -> Self {
        Self::new(
            SunburstErrorKind::BlobReferenced,
            format!("blob {hash} is still referenced by one or more packages"),
        )
    }

    pub(crate) fn invalid_state(op: &str) -> Self {
        Self::new(
            SunburstErrorKind::Closing,
            format!("cannot perform `{op}` on a transaction that is no longer open"),
        )
    }

    pub(crate) fn peer_missing(name: impl fmt::Display) -> Self {
        Self::new(SunburstErrorKind::PeerMissing, format!("no loaded peer named {name}"))
    }

    pub(crate) fn peer_import_missing(peer: impl fmt::Display, target: impl fmt::Display) -> Self {
        Self::new(
            SunburstErrorKind::PeerImportMissing,
            format!("peer {peer} does not import package {target}"),
        )
    }

    /// A peer declared something malformed about itself (e.g. an
    /// import name that is not a valid [`crate::identity::PackageName`]),
    /// as distinct from a catalog lookup failure (spec.md §4.F).
    pub(crate) fn peer_misconfigured(peer: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::new(SunburstErrorKind::PeerMisconfigured, format!("peer {peer} is misconfigured: {reason}"))
    }
}

impl From<rusqlite::Error> for SunburstError {
    fn from(err: rusqlite::Error) -> Self {
        Self::new(SunburstErrorKind::Db, err.to_string()).with_source(err)
    }
}

impl From<std::io::Error> for SunburstError {
    fn from(err: std::io::Error) -> Self {
        Self::new(SunburstErrorKind::Io, err.to_string()).with_source(err)
    }
}

impl From<hex::FromHexError> for SunburstError {
    fn from(err: hex::FromHexError) -> Self {
        Self::new(SunburstErrorKind::Io, format!("invalid hex: {err}")).with_source(err)
    }
}

/// Convenience wrapper for a PathBuf-carrying I/O failure, used when the
/// path itself is useful context (e.g. directory creation races).
pub(crate) fn io_at(path: &std::path::Path, err: std::io::Error) -> SunburstError {
    SunburstError::new(
        SunburstErrorKind::Io,
        format!("I/O error at {}: {err}", path.display()),
    )
    .with_source(err)
}

pub type Result<T> = std::result::Result<T, SunburstError>;
