//! Versions (spec.md §3).
//!
//! Ordering is lexicographic on `(major, minor, patch)`, then on the
//! qualifier, with the one documented tie-break: an absent qualifier
//! sorts *after* any present qualifier (a release is greater than its
//! snapshots). Qualifier comparison between two present qualifiers is
//! pure lexicographic byte comparison — see DESIGN.md for why this Open
//! Question (spec.md §9) is resolved literally rather than special-cased
//! for `SNAPSHOT`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SunburstError, SunburstErrorKind};

static QUALIFIER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_0-9]{1,255}$").unwrap());

pub const SNAPSHOT_QUALIFIER: &str = "SNAPSHOT";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub qualifier: Option<String>,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32, qualifier: Option<String>) -> Result<Self, SunburstError> {
        if let Some(q) = &qualifier {
            if !QUALIFIER_PATTERN.is_match(q) {
                return Err(SunburstError::new(
                    SunburstErrorKind::Io,
                    format!("`{q}` is not a valid version qualifier"),
                ));
            }
        }
        Ok(Self {
            major,
            minor,
            patch,
            qualifier,
        })
    }

    pub fn release(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            qualifier: None,
        }
    }

    /// A version is a snapshot iff its qualifier equals `SNAPSHOT`.
    pub fn is_snapshot(&self) -> bool {
        self.qualifier.as_deref() == Some(SNAPSHOT_QUALIFIER)
    }

    pub fn parse(text: &str) -> Result<Self, SunburstError> {
        let (numeric, qualifier) = match text.split_once('-') {
            Some((numeric, qualifier)) => (numeric, Some(qualifier.to_string())),
            None => (text, None),
        };
        let mut parts = numeric.split('.');
        let invalid = || {
            SunburstError::new(
                SunburstErrorKind::Io,
                format!("`{text}` is not a valid version, expected major.minor.patch[-qualifier]"),
            )
        };
        let major: u32 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let minor: u32 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let patch: u32 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Self::new(major, minor, patch, qualifier)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(q) = &self.qualifier {
            write!(f, "-{q}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = SunburstError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl TryFrom<String> for Version {
    type Error = SunburstError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            .then_with(|| match (&self.qualifier, &other.qualifier) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        for text in ["1.0.0", "0.0.1-SNAPSHOT", "23.4.7-rc1"] {
            let version = Version::parse(text).unwrap();
            assert_eq!(version.to_string(), text);
        }
    }

    #[test]
    fn release_sorts_above_its_snapshot() {
        let release = Version::parse("1.0.0").unwrap();
        let snapshot = Version::parse("1.0.0-SNAPSHOT").unwrap();
        assert!(release > snapshot);
    }

    #[test]
    fn numeric_fields_dominate_qualifier() {
        let lower = Version::parse("1.0.0-zzz").unwrap();
        let higher = Version::parse("1.0.1-aaa").unwrap();
        assert!(higher > lower);
    }

    #[test]
    fn is_snapshot_detects_exact_qualifier() {
        assert!(Version::parse("1.0.0-SNAPSHOT").unwrap().is_snapshot());
        assert!(!Version::parse("1.0.0-SNAPSHOT2").unwrap().is_snapshot());
        assert!(!Version::parse("1.0.0").unwrap().is_snapshot());
    }
}
