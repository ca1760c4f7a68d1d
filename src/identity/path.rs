//! Virtual package-entry paths (spec.md §3).
//!
//! Always absolute, rooted at `/`, made of segments matching
//! `[a-z0-9_-][a-z0-9_.-]*`. Consecutive slashes collapse; the empty
//! string is rejected. Each segment and the path as a whole are capped
//! at 255 characters.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SunburstError, SunburstErrorKind};

static SEGMENT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_-][a-z0-9_.-]*$").unwrap());

const MAX_SEGMENT_LENGTH: usize = 255;
const MAX_PATH_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn parse(text: &str) -> Result<Self, SunburstError> {
        let invalid = |reason: &str| {
            SunburstError::new(SunburstErrorKind::Io, format!("`{text}` is not a valid path: {reason}"))
        };

        if text.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if !text.starts_with('/') {
            return Err(invalid("must be absolute (start with /)"));
        }
        if text.len() > MAX_PATH_LENGTH {
            return Err(invalid("exceeds 255 characters"));
        }

        let segments: Vec<String> = text
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_string())
            .collect();

        for segment in &segments {
            if segment.len() > MAX_SEGMENT_LENGTH {
                return Err(invalid("a segment exceeds 255 characters"));
            }
            if !SEGMENT_PATTERN.is_match(segment) {
                return Err(invalid(&format!("segment `{segment}` is not valid")));
            }
        }

        Ok(Self { segments })
    }

    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for Path {
    type Err = SunburstError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl TryFrom<String> for Path {
    type Error = SunburstError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        for text in ["/a/b/c.txt", "/readme.md", "/a-b_c/d.e.f"] {
            let path = Path::parse(text).unwrap();
            assert_eq!(path.to_string(), text);
        }
    }

    #[test]
    fn collapses_consecutive_slashes() {
        let path = Path::parse("/a//b").unwrap();
        assert_eq!(path.to_string(), "/a/b");
    }

    #[test]
    fn root_renders_as_slash() {
        assert_eq!(Path::root().to_string(), "/");
    }

    #[test]
    fn rejects_relative_and_empty() {
        assert!(Path::parse("").is_err());
        assert!(Path::parse("a/b").is_err());
    }

    #[test]
    fn rejects_invalid_segment_characters() {
        assert!(Path::parse("/Upper.txt").is_err());
        assert!(Path::parse("/a b").is_err());
    }
}
