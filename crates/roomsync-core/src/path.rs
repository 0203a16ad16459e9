//! Field paths addressing individual fields inside a shared snapshot
//!
//! Paths are dot-separated (`"series.0.label"`). Purely numeric segments
//! address list indices, everything else addresses map keys. Edit locks
//! and predicted-entity scopes are both expressed as paths, and subtree
//! matching (`starts_with`) is how a lock on `series.0` covers
//! `series.0.label`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Map key
    Key(String),
    /// List index
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => write!(f, "{}", k),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// An addressable location inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Build a path from segments
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::InvalidPath("(empty)".to_string()));
        }
        Ok(Self { segments })
    }

    /// Parse a dot-separated path
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::InvalidPath("(empty)".to_string()));
        }
        let mut segments = Vec::new();
        for part in text.split('.') {
            if part.is_empty() {
                return Err(Error::InvalidPath(text.to_string()));
            }
            match part.parse::<usize>() {
                Ok(idx) => segments.push(Segment::Index(idx)),
                Err(_) => segments.push(Segment::Key(part.to_string())),
            }
        }
        Ok(Self { segments })
    }

    /// The path segments, root first
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Paths are never empty, but clippy expects the pair
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `self` lies inside the subtree rooted at `prefix`
    ///
    /// A path is inside its own subtree: `a.b` starts with `a.b`.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Extend this path with one more key segment
    pub fn child(&self, key: impl Into<String>) -> FieldPath {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.into()));
        FieldPath { segments }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FieldPath::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        FieldPath::parse(&s)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> String {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = FieldPath::parse("series.0.label").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.segments()[1], Segment::Index(0));
        assert_eq!(path.to_string(), "series.0.label");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse(".a").is_err());
    }

    #[test]
    fn test_starts_with() {
        let lock: FieldPath = "series.0".parse().unwrap();
        let inner: FieldPath = "series.0.label".parse().unwrap();
        let sibling: FieldPath = "series.1.label".parse().unwrap();

        assert!(inner.starts_with(&lock));
        assert!(lock.starts_with(&lock));
        assert!(!sibling.starts_with(&lock));
        assert!(!lock.starts_with(&inner));
    }

    #[test]
    fn test_child() {
        let base: FieldPath = "players.p1".parse().unwrap();
        assert_eq!(base.child("x").to_string(), "players.p1.x");
    }
}
