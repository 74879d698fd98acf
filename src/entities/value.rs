// Attribute values - the typed bag every entity carries
//
// Entities don't grow struct fields at runtime. Anything set by name lives
// here as a tagged value, which keeps JSON and column mapping type-safe.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ATTRIBUTE VALUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON scalar into an attribute value
    ///
    /// Arrays, objects and null have no attribute representation.
    pub fn from_json(value: &serde_json::Value) -> Option<AttrValue> {
        match value {
            serde_json::Value::Bool(b) => Some(AttrValue::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(AttrValue::Int)
                .or_else(|| n.as_f64().map(AttrValue::Float)),
            serde_json::Value::String(s) => Some(AttrValue::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrValue::Bool(b) => serde_json::json!(b),
            AttrValue::Int(n) => serde_json::json!(n),
            AttrValue::Float(f) => serde_json::json!(f),
            AttrValue::Str(s) => serde_json::json!(s),
        }
    }

    /// Render the way values appear inside `[Class] (id) {...}`
    pub fn repr(&self) -> String {
        match self {
            AttrValue::Str(s) => quote(s),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(n) => write!(f, "{}", n),
            // Keep a decimal point so floats never read back as integers
            AttrValue::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{:.1}", x),
            AttrValue::Float(x) => write!(f, "{}", x),
            AttrValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        AttrValue::Float(x)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

/// Single-quote a string, escaping backslashes and embedded quotes
pub(crate) fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

// ============================================================================
// ATTRIBUTES (ordered bag)
// ============================================================================

/// Ordered mapping from attribute name to value
///
/// Insertion order is kept so rendering and the JSON document stay stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttrValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Insert or overwrite in place (overwrites keep their original position)
    pub fn set(&mut self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        let pos = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_json_keeps_types() {
        let values = vec![
            AttrValue::Int(42),
            AttrValue::Float(3.0),
            AttrValue::Float(-0.25),
            AttrValue::Bool(true),
            AttrValue::Str("42".to_string()),
        ];

        let json = serde_json::to_string(&values).unwrap();
        let back: Vec<AttrValue> = serde_json::from_str(&json).unwrap();

        assert_eq!(back, values);
    }

    #[test]
    fn test_repr_quotes_strings_only() {
        assert_eq!(AttrValue::from("California").repr(), "'California'");
        assert_eq!(AttrValue::from("it's").repr(), "'it\\'s'");
        assert_eq!(AttrValue::Int(7).repr(), "7");
        assert_eq!(AttrValue::Float(2.0).repr(), "2.0");
        assert_eq!(AttrValue::Float(37.77).repr(), "37.77");
        assert_eq!(AttrValue::Bool(false).repr(), "false");
    }

    #[test]
    fn test_attributes_overwrite_keeps_position() {
        let mut attrs = Attributes::new();
        attrs.set("name", AttrValue::from("a"));
        attrs.set("rooms", AttrValue::Int(1));
        attrs.set("name", AttrValue::from("b"));

        let keys: Vec<&str> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "rooms"]);
        assert_eq!(attrs.get("name"), Some(&AttrValue::from("b")));

        assert_eq!(attrs.remove("name"), Some(AttrValue::from("b")));
        assert!(!attrs.contains("name"));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_from_json_rejects_compound_values() {
        assert_eq!(
            AttrValue::from_json(&serde_json::json!(5)),
            Some(AttrValue::Int(5))
        );
        assert_eq!(
            AttrValue::from_json(&serde_json::json!(5.5)),
            Some(AttrValue::Float(5.5))
        );
        assert_eq!(AttrValue::from_json(&serde_json::json!(null)), None);
        assert_eq!(AttrValue::from_json(&serde_json::json!([1, 2])), None);
    }
}
