//! Field metadata and the authoritative column order

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::record::Record;
use super::value::Value;
use crate::error::ModelError;

/// Type hint for a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[default]
    Unknown,
    Bool,
    Int,
    Float,
    String,
    Date,
    DateTime,
    List,
    Map,
    Mixed,
}

impl FieldType {
    /// Type hint describing a single value. Null carries no information.
    pub fn of(value: &Value) -> FieldType {
        match value {
            Value::Null => FieldType::Unknown,
            Value::Bool(_) => FieldType::Bool,
            Value::Int(_) => FieldType::Int,
            Value::Float(_) => FieldType::Float,
            Value::String(_) => FieldType::String,
            Value::Date(_) => FieldType::Date,
            Value::DateTime(_) => FieldType::DateTime,
            Value::List(_) => FieldType::List,
            Value::Map(_) => FieldType::Map,
        }
    }

    /// Widen the type to accommodate another type
    pub fn widen(self, other: FieldType) -> FieldType {
        if self == other {
            return self;
        }

        match (self, other) {
            (FieldType::Unknown, t) | (t, FieldType::Unknown) => t,
            (FieldType::Int, FieldType::Float) | (FieldType::Float, FieldType::Int) => {
                FieldType::Float
            }
            (FieldType::Date, FieldType::DateTime) | (FieldType::DateTime, FieldType::Date) => {
                FieldType::DateTime
            }
            _ => FieldType::Mixed,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Unknown => write!(f, "unknown"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Int => write!(f, "int"),
            FieldType::Float => write!(f, "float"),
            FieldType::String => write!(f, "string"),
            FieldType::Date => write!(f, "date"),
            FieldType::DateTime => write!(f, "datetime"),
            FieldType::List => write!(f, "list"),
            FieldType::Map => write!(f, "map"),
            FieldType::Mixed => write!(f, "mixed"),
        }
    }
}

/// Display formatter applied by renderers to a field's values
pub type Formatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Column metadata
#[derive(Clone)]
pub struct Field {
    /// Column name
    pub name: String,
    /// Type hint
    pub field_type: FieldType,
    /// Optional display formatter
    pub formatter: Option<Formatter>,
    /// Hidden fields take part in transformations but are not rendered
    pub hidden: bool,
}

impl Field {
    /// Create a field with an unknown type hint
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Unknown,
            formatter: None,
            hidden: false,
        }
    }

    /// Create a field with a specified type
    pub fn with_type(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::new(name)
        }
    }

    pub fn formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(f));
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn has_formatter(&self) -> bool {
        self.formatter.is_some()
    }

    /// Render a value through this field's formatter, or its plain display form
    pub fn format(&self, value: &Value) -> String {
        match &self.formatter {
            Some(f) => f(value),
            None => value.display().into_owned(),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("formatter", &self.formatter.as_ref().map(|_| "<fn>"))
            .field("hidden", &self.hidden)
            .finish()
    }
}

/// Ordered field list. The order of `fields` is the key order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from fields, keeping their order
    pub fn from_fields(fields: Vec<Field>) -> Result<Self, ModelError> {
        let mut schema = Self::new();
        for field in fields {
            if schema.has_field(&field.name) {
                return Err(ModelError::DuplicateField(field.name));
            }
            schema.push_checked(field)?;
        }
        Ok(schema)
    }

    /// Build a schema of untyped fields from an explicit key order
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> Result<Self, ModelError> {
        Self::from_fields(keys.iter().map(|k| Field::new(k.as_ref())).collect())
    }

    /// Derive a schema from records that carry no explicit order.
    ///
    /// Keys are sorted lexicographically. This is a deterministic fallback, not
    /// a reconstruction of any "natural" order; callers should pass an explicit
    /// key order instead.
    pub fn detect_from_records(records: &[Record]) -> Self {
        let keys: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.keys())
            .map(String::as_str)
            .collect();

        if !keys.is_empty() {
            warn!(
                columns = keys.len(),
                "no key order supplied; falling back to sorted column order"
            );
        }

        let fields = keys
            .into_iter()
            .map(|name| {
                let field_type = records
                    .iter()
                    .filter_map(|r| r.get(name))
                    .fold(FieldType::Unknown, |t, v| t.widen(FieldType::of(v)));
                Field::with_type(name, field_type)
            })
            .collect();
        Self { fields }
    }

    /// Column names in display order
    pub fn key_order(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Names of fields that renderers should emit
    pub fn visible_keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !f.hidden)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Replace the key order.
    ///
    /// Existing fields keep their metadata and move to their new position,
    /// names not yet known become untyped fields, and fields not named are
    /// dropped.
    pub fn set_key_order<S: AsRef<str>>(&mut self, keys: &[S]) -> Result<(), ModelError> {
        let mut reordered: Vec<Field> = Vec::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            if key.is_empty() {
                return Err(ModelError::EmptyFieldName);
            }
            if reordered.iter().any(|f| f.name == key) {
                return Err(ModelError::DuplicateField(key.to_string()));
            }
            let field = self
                .find_field(key)
                .cloned()
                .unwrap_or_else(|| Field::new(key));
            reordered.push(field);
        }
        self.fields = reordered;
        Ok(())
    }

    /// Look up a field by name
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a field in the key order
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    /// Append a field at the end of the key order.
    ///
    /// If a field of that name already exists its metadata is replaced and it
    /// keeps its position.
    pub fn add_field(&mut self, field: Field) -> Result<(), ModelError> {
        match self.field_index(&field.name) {
            Some(idx) => {
                self.fields[idx] = field;
                Ok(())
            }
            None => self.push_checked(field),
        }
    }

    /// Insert a new field at `index` (clamped to the end). Existing keys keep
    /// their relative order.
    pub fn insert_field(&mut self, index: usize, field: Field) -> Result<(), ModelError> {
        if field.name.is_empty() {
            return Err(ModelError::EmptyFieldName);
        }
        if self.has_field(&field.name) {
            return Err(ModelError::DuplicateField(field.name));
        }
        let index = index.min(self.fields.len());
        self.fields.insert(index, field);
        Ok(())
    }

    /// Borrow the fields in key order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn push_checked(&mut self, field: Field) -> Result<(), ModelError> {
        if field.name.is_empty() {
            return Err(ModelError::EmptyFieldName);
        }
        self.fields.push(field);
        Ok(())
    }
}
