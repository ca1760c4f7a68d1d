//! Hash algorithms and hash values (spec.md §3, §4.A).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{SunburstError, SunburstErrorKind};

/// A hash algorithm supported by the inventory. The design is
/// extensible (spec.md §3) but, today, only SHA2-256 is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha2_256,
}

impl HashAlgorithm {
    /// The stable numeric index used for ordering (spec.md §3).
    pub fn index(self) -> u32 {
        match self {
            Self::Sha2_256 => 0,
        }
    }

    /// The canonical, on-disk and on-wire text identifier.
    pub fn text(self) -> &'static str {
        match self {
            Self::Sha2_256 => "SHA2_256",
        }
    }

    /// The number of bytes a digest produced by this algorithm has.
    pub fn digest_size(self) -> usize {
        match self {
            Self::Sha2_256 => 32,
        }
    }

    fn from_text(text: &str) -> Option<Self> {
        match text {
            "SHA2_256" => Some(Self::Sha2_256),
            _ => None,
        }
    }

    pub(crate) fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha2_256 => Sha256::digest(bytes).to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// A streaming digest for one [`HashAlgorithm`], used while writing a
/// blob so the whole stream never needs to be buffered in memory.
pub(crate) enum Digester {
    Sha2_256(Sha256),
}

impl Digester {
    pub(crate) fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha2_256 => Self::Sha2_256(Sha256::new()),
        }
    }

    pub(crate) fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Sha2_256(hasher) => hasher.update(chunk),
        }
    }

    pub(crate) fn finish(self, algorithm: HashAlgorithm) -> Hash {
        let bytes = match self {
            Self::Sha2_256(hasher) => hasher.finalize().to_vec(),
        };
        Hash { algorithm, bytes }
    }
}

/// `(algorithm, bytes)`, where `bytes.len() == algorithm.digest_size()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash {
    algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl Hash {
    pub fn new(algorithm: HashAlgorithm, bytes: Vec<u8>) -> Result<Self, SunburstError> {
        if bytes.len() != algorithm.digest_size() {
            return Err(SunburstError::new(
                SunburstErrorKind::Io,
                format!(
                    "hash for {algorithm} must be {} bytes, got {}",
                    algorithm.digest_size(),
                    bytes.len()
                ),
            ));
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn of_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        Self {
            algorithm,
            bytes: algorithm.digest(data),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Upper-case hex encoding of the digest bytes only (no algorithm
    /// prefix) — used to build filesystem shard paths (spec.md §6.1)
    /// and the catalog's `hash` column.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.bytes)
    }
}

impl PartialOrd for Hash {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hash {
    fn cmp(&self, other: &Self) -> Ordering {
        self.algorithm
            .index()
            .cmp(&other.algorithm.index())
            .then_with(|| self.bytes.cmp(&other.bytes))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.text(), self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = SunburstError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (algo_text, hex_text) = text.split_once(':').ok_or_else(|| {
            SunburstError::new(SunburstErrorKind::Io, format!("malformed hash `{text}`, expected ALGO:HEX"))
        })?;
        let algorithm = HashAlgorithm::from_text(algo_text).ok_or_else(|| {
            SunburstError::new(SunburstErrorKind::Io, format!("unknown hash algorithm `{algo_text}`"))
        })?;
        if hex_text.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(SunburstError::new(
                SunburstErrorKind::Io,
                format!("hash hex must be upper case, got `{hex_text}`"),
            ));
        }
        let bytes = hex::decode(hex_text)?;
        Hash::new(algorithm, bytes)
    }
}

impl TryFrom<String> for Hash {
    type Error = SunburstError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_hash_round_trips() {
        let hash = Hash::of_bytes(HashAlgorithm::Sha2_256, b"Hello.");
        assert_eq!(
            hash.to_string(),
            "SHA2_256:2D8BD7D9BB5F85BA643F0110D50CB506A1FE439E769A22503193EA6046BB87F7"
        );
        let parsed: Hash = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn ordering_is_by_algorithm_then_bytes() {
        let a = Hash::of_bytes(HashAlgorithm::Sha2_256, b"a");
        let b = Hash::of_bytes(HashAlgorithm::Sha2_256, b"b");
        assert!(a != b);
        assert_eq!(a.cmp(&a), Ordering::Equal);
    }

    #[test]
    fn lower_case_hex_is_rejected() {
        let text = "SHA2_256:2d8bd7d9bb5f85ba643f0110d50cb506a1fe439e769a22503193ea6046bb87f7";
        assert!(text.parse::<Hash>().is_err());
    }
}
