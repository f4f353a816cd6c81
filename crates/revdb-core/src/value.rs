//! Property values stored in revisions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value that can be stored in a document property.
///
/// Maps are ordered so that the serialized form of a property set is
/// canonical, which the revision digest relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(Number::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(Number::Float(n)) => Some(*n),
            Value::Number(Number::Integer(n)) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Container nesting depth; scalars are 0
    pub fn depth(&self) -> usize {
        match self {
            Value::Array(arr) => 1 + arr.iter().map(Value::depth).max().unwrap_or(0),
            Value::Object(obj) => 1 + obj.values().map(Value::depth).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Returns true if every number in this value is finite
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Number(Number::Float(f)) => f.is_finite(),
            Value::Array(arr) => arr.iter().all(Value::is_finite),
            Value::Object(obj) => obj.values().all(Value::is_finite),
            _ => true,
        }
    }

    /// Look up a nested value, e.g. `"items[0].name"`.
    ///
    /// Dots separate object keys and `[n]` indexes arrays. A missing step or
    /// a malformed path gives `None`; the empty path is `self`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }

        let mut current = self;
        for step in path.split('.') {
            let (key, mut indexes) = step.split_at(step.find('[').unwrap_or(step.len()));
            if !key.is_empty() {
                current = current.as_object()?.get(key)?;
            } else if indexes.is_empty() {
                return None;
            }

            while !indexes.is_empty() {
                let (index, rest) = indexes.strip_prefix('[')?.split_once(']')?;
                current = current.as_array()?.get(index.parse::<usize>().ok()?)?;
                indexes = rest;
            }
        }
        Some(current)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Number::Integer(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(Number::Integer(v.into()))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(Number::Float(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Object(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Number(Number::Integer(i)),
                // u64 beyond i64 range and fractional numbers
                None => Value::Number(Number::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(Number::Integer(i)) => serde_json::Value::from(i),
            Value::Number(Number::Float(f)) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(Into::into).collect())
            }
            Value::Object(obj) => {
                serde_json::Value::Object(obj.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Number type supporting both integers and floats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_path() {
        let value = Value::from(serde_json::json!({
            "user": {"name": "ada", "tags": ["a", ["b", "c"]]},
            "items": [{"sku": 7}],
        }));

        assert_eq!(value.get_path("user.name"), Some(&Value::from("ada")));
        assert_eq!(value.get_path("user.tags[1][0]"), Some(&Value::from("b")));
        assert_eq!(value.get_path("items[0].sku"), Some(&Value::from(7i64)));
        assert_eq!(value.get_path(""), Some(&value));
        assert_eq!(value.get_path("user.missing"), None);
        assert_eq!(value.get_path("items[3]"), None);
    }

    #[test]
    fn test_get_path_rejects_malformed() {
        let value = Value::from(serde_json::json!({"a": [1, 2], "b": {"c": 1}}));

        assert_eq!(value.get_path("a[1"), None);
        assert_eq!(value.get_path("a[x]"), None);
        assert_eq!(value.get_path("a[0]x"), None);
        assert_eq!(value.get_path("b..c"), None);
        assert_eq!(value.get_path("b.c."), None);
    }

    #[test]
    fn test_depth() {
        assert_eq!(Value::from(1i64).depth(), 0);
        assert_eq!(Value::from(vec![1i64, 2]).depth(), 1);

        let json: serde_json::Value = serde_json::json!({"a": {"b": [1]}});
        assert_eq!(Value::from(json).depth(), 3);
    }

    #[test]
    fn test_json_round_trip() {
        let json = serde_json::json!({
            "title": "Dune",
            "pages": 412,
            "rating": 4.5,
            "read": false,
            "tags": ["sf", null],
        });

        let value = Value::from(json.clone());
        assert_eq!(value.get_path("pages").and_then(Value::as_i64), Some(412));
        assert_eq!(serde_json::Value::from(value.clone()), json);

        let text = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_non_finite_detected() {
        let value = Value::from(vec![Value::from(1.0), Value::from(f64::INFINITY)]);
        assert!(!value.is_finite());
        assert!(Value::from(2.5).is_finite());
    }
}
