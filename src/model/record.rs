//! A single row of field name to value pairs

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use super::value::{Value, NULL};

/// One row. Entry order inside a record carries no meaning; the schema decides
/// how columns are laid out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

/// Build a [`Record`] from `key => value` pairs.
///
/// ```
/// use tablepipe::{record, Value};
///
/// let r = record! { "id" => 1, "name" => "a" };
/// assert_eq!(r.get("id"), Some(&Value::Int(1)));
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.set($key, $value); )+
        record
    }};
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by field name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a value by field name; missing fields read as null
    pub fn value(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&NULL)
    }

    /// Set a field, returning the previous value if any
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON object. Other JSON values are rejected.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Object(obj) => Some(
                obj.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<IndexMap<String, Value>> for Record {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reads_as_null() {
        let r = crate::record! { "id" => 1 };
        assert_eq!(r.value("id"), &Value::Int(1));
        assert!(r.value("nope").is_null());
        assert!(r.get("nope").is_none());
    }

    #[test]
    fn test_display() {
        let r = crate::record! { "id" => 3, "name" => "x", "ok" => true };
        assert_eq!(r.to_string(), r#"{id: 3, name: "x", ok: true}"#);
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({ "a": 1, "b": "two" });
        let r = Record::from_json(json).unwrap();
        assert_eq!(r.value("b"), &Value::from("two"));
        assert!(Record::from_json(serde_json::json!([1, 2])).is_none());
    }
}
