//! Table: a schema plus the records it governs

use uuid::Uuid;

use super::record::Record;
use super::schema::Schema;
use super::value::{Value, NULL};
use crate::config::PipelineOptions;
use crate::error::{ModelError, PipelineError};
use crate::ops::Operation;
use crate::pipeline::Pipeline;

/// A table containing a schema and rows.
///
/// Contents are only handed out by copy. A table can also carry a list of
/// transformations that renderers materialize before serializing it.
#[derive(Debug, Clone)]
pub struct Table {
    id: String,
    schema: Schema,
    records: Vec<Record>,
    transforms: Vec<Operation>,
    options: PipelineOptions,
}

impl Table {
    /// Create a new empty table with a schema
    pub fn new(schema: Schema) -> Self {
        Self::from_records(schema, Vec::new())
    }

    /// Create a table from a schema and records
    pub fn from_records(schema: Schema, records: Vec<Record>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schema,
            records,
            transforms: Vec::new(),
            options: PipelineOptions::default(),
        }
    }

    /// Create a table with an explicit key order
    pub fn with_key_order<S: AsRef<str>>(
        keys: &[S],
        records: Vec<Record>,
    ) -> Result<Self, ModelError> {
        Ok(Self::from_records(Schema::from_keys(keys)?, records))
    }

    /// Create a table whose schema is derived from the records.
    ///
    /// Column order falls back to lexicographic; see [`Schema::detect_from_records`].
    pub fn detect(records: Vec<Record>) -> Self {
        let schema = Schema::detect_from_records(&records);
        Self::from_records(schema, records)
    }

    /// Add a row to the table
    pub fn add_record(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Unique content id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Copy of the schema
    pub fn schema(&self) -> Schema {
        self.schema.clone()
    }

    /// Column names in display order
    pub fn key_order(&self) -> Vec<String> {
        self.schema.key_order()
    }

    /// Copy of all records
    pub fn records(&self) -> Vec<Record> {
        self.records.clone()
    }

    /// Copy of one record
    pub fn record(&self, index: usize) -> Option<Record> {
        self.records.get(index).cloned()
    }

    /// Borrowed, read-only iteration over the records
    pub fn iter_records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter()
    }

    /// Number of rows
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of every row laid out by the visible key order.
    ///
    /// Missing fields come out as null; fields unknown to the schema are left out.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        let keys = self.schema.visible_keys();
        self.records
            .iter()
            .map(|r| keys.iter().map(|k| r.value(k).clone()).collect())
            .collect()
    }

    /// Display strings of every row, with field formatters applied.
    /// Missing fields render as the empty string.
    pub fn formatted_rows(&self) -> Vec<Vec<String>> {
        let fields: Vec<_> = self.schema.fields().iter().filter(|f| !f.hidden).collect();
        self.records
            .iter()
            .map(|r| {
                fields
                    .iter()
                    .map(|f| match r.get(&f.name) {
                        Some(v) => f.format(v),
                        None => NULL.display().into_owned(),
                    })
                    .collect()
            })
            .collect()
    }

    /// Attach transformations to be applied when the table is materialized
    pub fn with_transforms(mut self, operations: Vec<Operation>) -> Self {
        self.transforms = operations;
        self
    }

    /// Set the options used when materializing attached transformations
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn transforms(&self) -> &[Operation] {
        &self.transforms
    }

    pub fn has_transforms(&self) -> bool {
        !self.transforms.is_empty()
    }

    /// Start a pipeline over this table
    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(self).with_options(self.options.clone())
    }

    /// Run the attached transformations, producing a new table.
    ///
    /// A table without transformations materializes to a copy of itself.
    pub fn materialize(&self) -> Result<Table, PipelineError> {
        if !self.has_transforms() {
            return Ok(self.clone());
        }
        self.transforms
            .iter()
            .cloned()
            .fold(self.pipeline(), Pipeline::push)
            .execute()
    }

    /// New table produced by a transformation: fresh id, nothing attached.
    pub(crate) fn derived(schema: Schema, records: Vec<Record>) -> Self {
        Self::from_records(schema, records)
    }

    pub(crate) fn schema_ref(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn records_ref(&self) -> &[Record] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;
    use crate::ops::SortKey;
    use crate::record;

    fn sample() -> Table {
        Table::with_key_order(
            &["name", "age"],
            vec![
                record! { "age" => 30, "name" => "bo", "extra" => 1 },
                record! { "name" => "al" },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rows_follow_key_order() {
        let table = sample();
        assert_eq!(
            table.rows(),
            vec![
                vec![Value::from("bo"), Value::Int(30)],
                vec![Value::from("al"), Value::Null],
            ]
        );
        assert_eq!(
            table.formatted_rows(),
            vec![vec!["bo".to_string(), "30".to_string()], vec!["al".to_string(), String::new()]]
        );
    }

    #[test]
    fn test_accessors_return_copies() {
        let table = sample();
        let mut records = table.records();
        records[0].set("name", "changed");
        records.clear();
        let mut schema = table.schema();
        schema.add_field(Field::new("other")).unwrap();

        assert_eq!(table.record_count(), 2);
        assert_eq!(table.record(0).unwrap().value("name"), &Value::from("bo"));
        assert_eq!(table.key_order(), vec!["name", "age"]);
    }

    #[test]
    fn test_materialize_runs_attached_transforms() {
        let table = sample().with_transforms(vec![Operation::sort(vec![SortKey::asc("name")])]);
        let out = table.materialize().unwrap();
        assert_eq!(out.record(0).unwrap().value("name"), &Value::from("al"));
        assert_ne!(out.id(), table.id());
        assert!(!out.has_transforms());
        // source untouched
        assert_eq!(table.record(0).unwrap().value("name"), &Value::from("bo"));
    }
}
