//! Computed columns

use std::fmt;
use std::sync::Arc;

use super::guarded;
use crate::error::PipelineError;
use crate::model::{Field, FieldType, Record, Schema, Value};

/// Shared per-record compute function
pub type ComputeFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Sets a computed value on every record and registers the column in the
/// schema once per application.
#[derive(Clone)]
pub struct AddColumn {
    name: String,
    compute: Option<ComputeFn>,
    position: Option<usize>,
}

impl AddColumn {
    pub const NAME: &'static str = "add_column";

    pub fn new<F, V>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Record) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self {
            name: name.into(),
            compute: Some(Arc::new(move |r: &Record| -> Value { compute(r).into() })),
            position: None,
        }
    }

    /// Build from a compute function that may be absent. An absent function
    /// fails validation.
    pub fn from_compute(name: impl Into<String>, compute: Option<ComputeFn>) -> Self {
        Self {
            name: name.into(),
            compute,
            position: None,
        }
    }

    /// Insert the new column at `index` instead of appending it
    pub fn at(mut self, index: usize) -> Self {
        self.position = Some(index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.is_empty() {
            return Err(PipelineError::configuration(
                Self::NAME,
                "column name must not be empty",
            ));
        }
        if self.compute.is_none() {
            return Err(PipelineError::configuration(
                Self::NAME,
                format!("compute function is required for column {}", self.name),
            ));
        }
        Ok(())
    }

    pub fn plan(&self, input: &Schema) -> Result<Schema, PipelineError> {
        let mut schema = input.clone();
        self.register(&mut schema, FieldType::Unknown)?;
        Ok(schema)
    }

    pub fn apply(
        &self,
        records: &[Record],
        schema: &Schema,
    ) -> Result<(Vec<Record>, Schema), PipelineError> {
        let Some(compute) = &self.compute else {
            return Err(PipelineError::configuration(
                Self::NAME,
                format!("compute function is required for column {}", self.name),
            ));
        };

        let mut field_type = FieldType::Unknown;
        let mut out = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let value = guarded(|| compute(record)).map_err(|msg| {
                PipelineError::execution(
                    Self::NAME,
                    format!("compute for column {} panicked: {}", self.name, msg),
                )
                .with_record(index, record)
            })?;
            field_type = field_type.widen(FieldType::of(&value));
            let mut record = record.clone();
            record.set(self.name.clone(), value);
            out.push(record);
        }

        let mut schema = schema.clone();
        self.register(&mut schema, field_type)?;
        Ok((out, schema))
    }

    /// Add the column to `schema`. An existing column keeps its position.
    fn register(&self, schema: &mut Schema, field_type: FieldType) -> Result<(), PipelineError> {
        if schema.has_field(&self.name) {
            return Ok(());
        }
        let field = Field::with_type(self.name.clone(), field_type);
        let added = match self.position {
            Some(index) => schema.insert_field(index, field),
            None => schema.add_field(field),
        };
        added.map_err(|e| PipelineError::configuration(Self::NAME, e.to_string()))
    }
}

impl fmt::Debug for AddColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddColumn")
            .field("name", &self.name)
            .field("compute", &self.compute.as_ref().map(|_| "<fn>"))
            .field("position", &self.position)
            .finish()
    }
}
