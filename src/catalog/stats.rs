//! Column statistics values as reported by a block store.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed statistics or literal value.
///
/// Integers and floats compare with each other numerically; any other
/// cross-type comparison is undefined and yields `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarValue {
    Boolean(bool),
    Int(i64),
    Float(f64),
    Utf8(String),
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for ScalarValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => Some(a.cmp(b)),
            (ScalarValue::Int(a), ScalarValue::Int(b)) => Some(a.cmp(b)),
            (ScalarValue::Int(a), ScalarValue::Float(b)) => (*a as f64).partial_cmp(b),
            (ScalarValue::Float(a), ScalarValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (ScalarValue::Float(a), ScalarValue::Float(b)) => a.partial_cmp(b),
            (ScalarValue::Utf8(a), ScalarValue::Utf8(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Boolean(v) => write!(f, "{v}"),
            ScalarValue::Int(v) => write!(f, "{v}"),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Utf8(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int(v as i64)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Utf8(v.to_string())
    }
}

/// Min / max / null-count statistics for one column of one block.
///
/// Any field may be missing; pruning treats a missing bound as "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub min: Option<ScalarValue>,
    pub max: Option<ScalarValue>,
    pub null_count: Option<u64>,
}

impl ColumnStats {
    pub fn new(min: impl Into<ScalarValue>, max: impl Into<ScalarValue>) -> Self {
        Self {
            min: Some(min.into()),
            max: Some(max.into()),
            null_count: Some(0),
        }
    }

    pub fn with_null_count(mut self, null_count: u64) -> Self {
        self.null_count = Some(null_count);
        self
    }

    /// Both bounds, if the store reported them.
    pub fn range(&self) -> Option<(&ScalarValue, &ScalarValue)> {
        Some((self.min.as_ref()?, self.max.as_ref()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cross_type_ordering() {
        assert!(ScalarValue::Int(3) < ScalarValue::Float(3.5));
        assert!(ScalarValue::Float(10.0) > ScalarValue::Int(9));
        assert_eq!(ScalarValue::Int(4), ScalarValue::Float(4.0));
    }

    #[test]
    fn test_incomparable_types() {
        let a = ScalarValue::Int(1);
        let b = ScalarValue::Utf8("1".into());
        assert_eq!(a.partial_cmp(&b), None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_range_requires_both_bounds() {
        let stats = ColumnStats {
            min: Some(ScalarValue::Int(0)),
            max: None,
            null_count: None,
        };
        assert!(stats.range().is_none());
        assert!(ColumnStats::new(0, 10).range().is_some());
    }
}
