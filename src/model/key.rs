//! Composite group key handling

use super::record::Record;
use super::value::Value;

/// Tuple of values identifying a group.
///
/// Equality is value equality (so `Int(1)` and `Float(1.0)` land in the same
/// group), and hashing agrees with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(pub Vec<Value>);

impl GroupKey {
    /// Key values in column order
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

/// Builder for computing composite keys from records
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    columns: Vec<String>,
}

impl KeyBuilder {
    /// Create a new key builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key columns by name
    pub fn with_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Build a key from a record; missing fields contribute null
    pub fn build_key(&self, record: &Record) -> GroupKey {
        GroupKey(
            self.columns
                .iter()
                .map(|c| record.value(c).clone())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use rustc_hash::FxBuildHasher;
    use std::hash::BuildHasher;

    #[test]
    fn test_numeric_keys_unify() {
        let builder = KeyBuilder::new().with_columns(&["k"]);
        let a = builder.build_key(&record! { "k" => 1 });
        let b = builder.build_key(&record! { "k" => 1.0 });
        assert_eq!(a, b);
        assert_eq!(FxBuildHasher.hash_one(&a), FxBuildHasher.hash_one(&b));
    }

    #[test]
    fn test_missing_column_is_null() {
        let builder = KeyBuilder::new().with_columns(&["a", "b"]);
        let key = builder.build_key(&record! { "a" => "x" });
        assert_eq!(key.into_values(), vec![Value::from("x"), Value::Null]);
    }
}
