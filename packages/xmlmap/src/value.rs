//! The map model exchanged with callers.

use indexmap::IndexMap;
use serde::Serialize;

/// Ordered map of element names (or marker keys) to values.
pub type Map = IndexMap<String, Value>;

/// A node of the map model.
///
/// Map equality ignores key order, so a decoded map compares equal to the
/// map it was encoded from even when markers moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Text content.
    Scalar(String),
    /// Sibling elements sharing the tag name of the entry that holds the list.
    List(Vec<Value>),
    /// An element with named children and/or marker keys.
    Map(Map),
}

impl Value {
    /// Try to get value as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get value as list reference
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Try to get value as map reference
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key when the value is a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Empty string, empty list or empty map.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(if b { "true" } else { "false" }.to_string())
    }
}

macro_rules! scalar_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Scalar(n.to_string())
                }
            }
        )*
    };
}

scalar_from_number!(i32, i64, u32, u64, usize, f64);

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Import generic JSON.
///
/// Booleans become `"true"`/`"false"`, numbers their decimal form and null
/// the empty string. Objects whose keys are exactly `"0"`, `"1"`, ... in
/// order are read as lists, like arrays.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Scalar(String::new()),
            serde_json::Value::Bool(b) => Value::from(b),
            serde_json::Value::Number(n) => Value::Scalar(n.to_string()),
            serde_json::Value::String(s) => Value::Scalar(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(object) => {
                if has_positional_keys(&object) {
                    Value::List(object.into_iter().map(|(_, v)| Value::from(v)).collect())
                } else {
                    Value::Map(
                        object
                            .into_iter()
                            .map(|(k, v)| (k, Value::from(v)))
                            .collect(),
                    )
                }
            }
        }
    }
}

/// Non-empty object keyed `"0".."n-1"` in insertion order.
fn has_positional_keys(object: &serde_json::Map<String, serde_json::Value>) -> bool {
    !object.is_empty()
        && object
            .keys()
            .enumerate()
            .all(|(index, key)| *key == index.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_booleans_normalize_to_strings() {
        assert_eq!(Value::from(true), Value::from("true"));
        assert_eq!(Value::from(false), Value::from("false"));
        assert_eq!(Value::from(json!(true)), Value::from("true"));
    }

    #[test]
    fn test_json_scalars() {
        assert_eq!(Value::from(json!(80)), Value::from("80"));
        assert_eq!(Value::from(json!(1.5)), Value::from("1.5"));
        assert_eq!(Value::from(json!(null)), Value::from(""));
    }

    #[test]
    fn test_json_array_is_list() {
        let value = Value::from(json!(["a", "b"]));
        assert_eq!(value, Value::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_positional_object_is_list() {
        let value = Value::from(json!({"0": "a", "1": "b"}));
        assert_eq!(value, Value::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_non_contiguous_keys_stay_a_map() {
        let value = Value::from(json!({"0": "a", "2": "b"}));
        assert!(value.as_map().is_some());

        let value = Value::from(json!({"1": "a"}));
        assert!(value.as_map().is_some());

        let value = Value::from(json!({"00": "a"}));
        assert!(value.as_map().is_some());
    }

    #[test]
    fn test_object_preserves_insertion_order() {
        let value = Value::from(json!({"b": "1", "a": "2"}));
        let keys: Vec<_> = value.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let mut first = Map::new();
        first.insert("a".to_string(), "1".into());
        first.insert("b".to_string(), "2".into());

        let mut second = Map::new();
        second.insert("b".to_string(), "2".into());
        second.insert("a".to_string(), "1".into());

        assert_eq!(Value::Map(first), Value::Map(second));
    }

    #[test]
    fn test_serialize_to_json() {
        let value = Value::from(json!({"note": {"to": ["a", "b"], "from": "c"}}));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, json!({"note": {"to": ["a", "b"], "from": "c"}}));
    }

    #[test]
    fn test_accessors() {
        let value = Value::from(json!({"to": "Tove", "cc": ["a", "b"]}));
        assert_eq!(value.get("to").and_then(Value::as_str), Some("Tove"));
        assert_eq!(value.get("cc").and_then(Value::as_list).map(<[_]>::len), Some(2));
        assert!(value.get("missing").is_none());
        assert!(Value::from("").is_empty());
        assert!(!value.is_empty());
    }
}
