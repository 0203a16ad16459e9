//! Dynamic value tree for mode-agnostic shared snapshots
//!
//! Every game/tool replicates a differently shaped state blob. The engine
//! treats all of them as one `Value` tree and addresses individual fields
//! through [`FieldPath`], which is what makes field-granular reconciliation
//! possible without knowing any payload schema.

use crate::path::{FieldPath, Segment};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamic value representing any shared-state data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// No value / null
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (counts, row indices, scores)
    Int(i64),
    /// Floating point value (positions, velocities, sizes)
    Float(f64),
    /// String value
    String(String),
    /// List of values
    List(Vec<Value>),
    /// Map of string keys to values
    Map(ValueMap),
}

/// A map of string keys to dynamic values
///
/// Uses IndexMap to preserve insertion order, which keeps serialization
/// deterministic across peers holding equal state.
pub type ValueMap = IndexMap<String, Value>;

impl Value {
    /// Create an empty map value
    pub fn map() -> Self {
        Value::Map(ValueMap::new())
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Try to get this value as a map
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Try to get this value as a mutable map
    pub fn as_map_mut(&mut self) -> Option<&mut ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Resolve a field path to a reference, if every segment exists
    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        let mut current = self;
        for segment in path.segments() {
            current = match (segment, current) {
                (Segment::Key(key), Value::Map(map)) => map.get(key.as_str())?,
                (Segment::Index(idx), Value::List(list)) => list.get(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Resolve a field path to a mutable reference, if every segment exists
    pub fn get_path_mut(&mut self, path: &FieldPath) -> Option<&mut Value> {
        let mut current = self;
        for segment in path.segments() {
            current = match (segment, current) {
                (Segment::Key(key), Value::Map(map)) => map.get_mut(key.as_str())?,
                (Segment::Index(idx), Value::List(list)) => list.get_mut(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write a value at a field path
    ///
    /// Missing intermediate maps are created for key segments. Index
    /// segments must resolve into an existing list slot; writing past the
    /// end of a list or indexing a non-list is an error.
    pub fn set_path(&mut self, path: &FieldPath, value: Value) -> Result<()> {
        let mut current = self;
        let segments = path.segments();
        for (i, segment) in segments.iter().enumerate() {
            let last = i + 1 == segments.len();
            match segment {
                Segment::Key(key) => {
                    let map = match current {
                        Value::Map(map) => map,
                        Value::Null => {
                            *current = Value::map();
                            match current {
                                Value::Map(map) => map,
                                _ => unreachable!(),
                            }
                        }
                        other => {
                            return Err(Error::PathMismatch {
                                path: path.to_string(),
                                expected: "map",
                                got: other.type_name(),
                            })
                        }
                    };
                    if last {
                        map.insert(key.clone(), value);
                        return Ok(());
                    }
                    current = map.entry(key.clone()).or_insert_with(Value::map);
                }
                Segment::Index(idx) => {
                    let list = match current {
                        Value::List(list) => list,
                        other => {
                            return Err(Error::PathMismatch {
                                path: path.to_string(),
                                expected: "list",
                                got: other.type_name(),
                            })
                        }
                    };
                    let len = list.len();
                    let slot = list.get_mut(*idx).ok_or_else(|| Error::IndexOutOfRange {
                        path: path.to_string(),
                        index: *idx,
                        len,
                    })?;
                    if last {
                        *slot = value;
                        return Ok(());
                    }
                    current = slot;
                }
            }
        }
        // Empty paths are rejected at parse time.
        Err(Error::InvalidPath(String::new()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::List(list) => {
                write!(f, "[")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(vec: Vec<T>) -> Self {
        Value::List(vec.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_value_types() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Float(3.5).as_float(), Some(3.5));
        assert_eq!(Value::Int(42).as_float(), Some(42.0));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
    }

    #[test]
    fn test_get_path() {
        let mut root = Value::map();
        root.set_path(&path("series.0.label"), Value::from("Line A"))
            .unwrap_err();

        root.set_path(&path("axes.x.text"), Value::from("Time"))
            .unwrap();
        assert_eq!(
            root.get_path(&path("axes.x.text")).and_then(Value::as_str),
            Some("Time")
        );
        assert!(root.get_path(&path("axes.y")).is_none());
    }

    #[test]
    fn test_set_path_creates_maps() {
        let mut root = Value::map();
        root.set_path(&path("players.p1.x"), Value::Float(10.0))
            .unwrap();
        root.set_path(&path("players.p1.y"), Value::Float(20.0))
            .unwrap();

        let p1 = root.get_path(&path("players.p1")).unwrap();
        assert_eq!(p1.as_map().unwrap().len(), 2);
    }

    #[test]
    fn test_set_path_into_list() {
        let mut root = Value::map();
        root.set_path(
            &path("series"),
            Value::List(vec![Value::map(), Value::map()]),
        )
        .unwrap();
        root.set_path(&path("series.1.label"), Value::from("B"))
            .unwrap();
        assert_eq!(
            root.get_path(&path("series.1.label"))
                .and_then(Value::as_str),
            Some("B")
        );

        let err = root
            .set_path(&path("series.5.label"), Value::from("nope"))
            .unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 5, .. }));
    }

    #[test]
    fn test_path_type_mismatch() {
        let mut root = Value::map();
        root.set_path(&path("score"), Value::Int(7)).unwrap();
        let err = root
            .set_path(&path("score.nested"), Value::Int(1))
            .unwrap_err();
        assert!(matches!(err, Error::PathMismatch { .. }));
    }

    #[test]
    fn test_json_round_trip() {
        let text = r#"{"round":1,"players":{"p1":{"x":10.5,"grounded":true,"name":"A"}}}"#;
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(
            value.get_path(&path("players.p1.x")).and_then(Value::as_float),
            Some(10.5)
        );
        assert_eq!(
            value
                .get_path(&path("players.p1.grounded"))
                .and_then(Value::as_bool),
            Some(true)
        );

        let back: Value = serde_json::from_str(&serde_json::to_string(&value).unwrap()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_value_from() {
        let _: Value = true.into();
        let _: Value = 42i64.into();
        let _: Value = 2.5f64.into();
        let _: Value = "hello".into();
        let _: Value = vec![1i64, 2, 3].into();
    }
}
