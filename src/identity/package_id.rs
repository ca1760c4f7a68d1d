//! Package identifiers (spec.md §3): `(name, version)`, textual form
//! `name:major.minor.patch[-qualifier]`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SunburstError, SunburstErrorKind};
use crate::identity::name::PackageName;
use crate::identity::version::Version;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageIdentifier {
    pub name: PackageName,
    pub version: Version,
}

impl PackageIdentifier {
    pub fn new(name: PackageName, version: Version) -> Self {
        Self { name, version }
    }

    pub fn parse(text: &str) -> Result<Self, SunburstError> {
        let (name, version) = text.split_once(':').ok_or_else(|| {
            SunburstError::new(
                SunburstErrorKind::Io,
                format!("`{text}` is not a valid package identifier, expected name:version"),
            )
        })?;
        Ok(Self::new(PackageName::parse(name)?, Version::parse(version)?))
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

impl FromStr for PackageIdentifier {
    type Err = SunburstError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl TryFrom<String> for PackageIdentifier {
    type Error = SunburstError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<PackageIdentifier> for String {
    fn from(identifier: PackageIdentifier) -> Self {
        identifier.to_string()
    }
}

impl PartialOrd for PackageIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name).then_with(|| self.version.cmp(&other.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let text = "com.io7m.example.main:1.0.0-SNAPSHOT";
        let id = PackageIdentifier::parse(text).unwrap();
        assert_eq!(id.to_string(), text);
    }

    #[test]
    fn ordered_by_name_then_version() {
        let a = PackageIdentifier::parse("a.b:1.0.0").unwrap();
        let b = PackageIdentifier::parse("a.c:0.0.1").unwrap();
        assert!(a < b);
    }
}
