//! Package names (spec.md §3).

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SunburstError, SunburstErrorKind};

static PACKAGE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]*(\.[a-z][a-z0-9_-]*)*$").unwrap());

/// A package name: `[a-z][a-z0-9_-]*(\.[a-z][a-z0-9_-]*)*`, at most 255
/// characters, case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    pub fn parse(text: &str) -> Result<Self, SunburstError> {
        if text.len() > 255 {
            return Err(SunburstError::new(
                SunburstErrorKind::Io,
                format!("package name `{text}` exceeds 255 characters"),
            ));
        }
        if !PACKAGE_NAME_PATTERN.is_match(text) {
            return Err(SunburstError::new(
                SunburstErrorKind::Io,
                format!("`{text}` is not a valid package name"),
            ));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackageName {
    type Err = SunburstError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl TryFrom<String> for PackageName {
    type Error = SunburstError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dotted_names() {
        assert!(PackageName::parse("com.io7m.example.main").is_ok());
        assert!(PackageName::parse("a").is_ok());
        assert!(PackageName::parse("a-b_c.d0").is_ok());
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(PackageName::parse("").is_err());
        assert!(PackageName::parse("Com.Example").is_err());
        assert!(PackageName::parse(".leading.dot").is_err());
        assert!(PackageName::parse("trailing.dot.").is_err());
        assert!(PackageName::parse("0leadingdigit").is_err());
    }

    #[test]
    fn round_trips() {
        let text = "com.io7m.example.main";
        let name = PackageName::parse(text).unwrap();
        assert_eq!(name.to_string(), text);
    }
}
