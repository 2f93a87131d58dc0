//! Grouping with aggregation

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use super::aggregate::AggregateFunc;
use crate::error::PipelineError;
use crate::model::{Field, GroupKey, KeyBuilder, Record, Schema};

/// Partitions records by the values of `keys` and emits one record per group,
/// in first-occurrence order.
///
/// Output columns are the group keys (in order) followed by the aggregate
/// names (in the order they were added).
#[derive(Debug, Clone, Default)]
pub struct GroupBy {
    keys: Vec<String>,
    aggregates: Vec<(String, AggregateFunc)>,
}

impl GroupBy {
    pub const NAME: &'static str = "group_by";

    pub fn new<S: AsRef<str>>(keys: &[S]) -> Self {
        Self {
            keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            aggregates: Vec::new(),
        }
    }

    /// Add an output column computed by `func`
    pub fn aggregate(mut self, name: impl Into<String>, func: AggregateFunc) -> Self {
        self.aggregates.push((name.into(), func));
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn aggregates(&self) -> &[(String, AggregateFunc)] {
        &self.aggregates
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.keys.is_empty() {
            return Err(PipelineError::configuration(
                Self::NAME,
                "at least one group key is required",
            ));
        }
        let mut seen: Vec<&str> = Vec::with_capacity(self.keys.len() + self.aggregates.len());
        let names = self
            .keys
            .iter()
            .chain(self.aggregates.iter().map(|(name, _)| name));
        for name in names {
            if name.is_empty() {
                return Err(PipelineError::configuration(
                    Self::NAME,
                    "output column names must not be empty",
                ));
            }
            if seen.contains(&name.as_str()) {
                return Err(PipelineError::configuration(
                    Self::NAME,
                    format!("duplicate output column: {}", name),
                ));
            }
            seen.push(name);
        }
        Ok(())
    }

    pub fn plan(&self, input: &Schema) -> Result<Schema, PipelineError> {
        let mut referenced = self
            .keys
            .iter()
            .map(String::as_str)
            .chain(self.aggregates.iter().filter_map(|(_, f)| f.column()));
        if let Some(column) = referenced.find(|c| !input.has_field(c)) {
            return Err(PipelineError::configuration(
                Self::NAME,
                format!("unknown column: {}", column),
            ));
        }
        self.output_schema(input)
    }

    pub fn apply(
        &self,
        records: &[Record],
        schema: &Schema,
    ) -> Result<(Vec<Record>, Schema), PipelineError> {
        if let Some(key) = self.keys.iter().find(|k| !schema.has_field(k)) {
            return Err(PipelineError::execution(
                Self::NAME,
                format!("unknown group column: {}", key),
            ));
        }

        let builder = KeyBuilder::new().with_columns(&self.keys);
        let mut groups: IndexMap<GroupKey, Vec<&Record>, FxBuildHasher> = IndexMap::default();
        for record in records {
            groups
                .entry(builder.build_key(record))
                .or_default()
                .push(record);
        }

        let mut out = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let mut row = Record::new();
            for (column, value) in self.keys.iter().zip(key.into_values()) {
                row.set(column.clone(), value);
            }
            for (name, func) in &self.aggregates {
                let value = func.reduce(&members).map_err(|e| {
                    PipelineError::execution(Self::NAME, format!("{}: {}", name, e))
                })?;
                row.set(name.clone(), value);
            }
            out.push(row);
        }

        Ok((out, self.output_schema(schema)?))
    }

    fn output_schema(&self, input: &Schema) -> Result<Schema, PipelineError> {
        let key_fields = self.keys.iter().map(|k| {
            let mut field = input.find_field(k).cloned().unwrap_or_else(|| Field::new(k));
            field.hidden = false;
            field
        });
        let agg_fields = self
            .aggregates
            .iter()
            .map(|(name, func)| Field::with_type(name.clone(), func.output_type(input)));
        Schema::from_fields(key_fields.chain(agg_fields).collect())
            .map_err(|e| PipelineError::configuration(Self::NAME, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{FieldType, Value};
    use crate::record;

    fn staff() -> (Vec<Record>, Schema) {
        (
            vec![
                record! { "dept" => "Eng", "salary" => 80000 },
                record! { "dept" => "Eng", "salary" => 90000 },
                record! { "dept" => "Sales", "salary" => 70000 },
            ],
            Schema::from_keys(&["dept", "salary"]).unwrap(),
        )
    }

    #[test]
    fn test_count_and_average_per_group() {
        let (records, schema) = staff();
        let op = GroupBy::new(&["dept"])
            .aggregate("count", AggregateFunc::Count)
            .aggregate("avg", AggregateFunc::average("salary"));
        let (out, out_schema) = op.apply(&records, &schema).unwrap();

        assert_eq!(out_schema.key_order(), vec!["dept", "count", "avg"]);
        assert_eq!(
            out,
            vec![
                record! { "dept" => "Eng", "count" => 2, "avg" => 85000.0 },
                record! { "dept" => "Sales", "count" => 1, "avg" => 70000.0 },
            ]
        );
        assert_eq!(out_schema.find_field("count").unwrap().field_type, FieldType::Int);
        assert_eq!(out_schema.find_field("avg").unwrap().field_type, FieldType::Float);
    }

    #[test]
    fn test_first_occurrence_order_and_mixed_numeric_keys() {
        let records = vec![
            record! { "k" => 2, "v" => 1 },
            record! { "k" => 1, "v" => 1 },
            record! { "k" => 2.0, "v" => 1 },
            record! { "k" => "2", "v" => 1 },
            record! { "v" => 1 },
        ];
        let schema = Schema::from_keys(&["k", "v"]).unwrap();
        let op = GroupBy::new(&["k"]).aggregate("n", AggregateFunc::Count);
        let (out, _) = op.apply(&records, &schema).unwrap();
        let summary: Vec<(Value, Value)> = out
            .iter()
            .map(|r| (r.value("k").clone(), r.value("n").clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Value::Int(2), Value::Int(2)),
                (Value::Int(1), Value::Int(1)),
                (Value::from("2"), Value::Int(1)),
                (Value::Null, Value::Int(1)),
            ]
        );
    }

    #[test]
    fn test_multi_key_group_count_matches_distinct_tuples() {
        let records = vec![
            record! { "a" => 1, "b" => "x" },
            record! { "a" => 1, "b" => "y" },
            record! { "a" => 1, "b" => "x" },
            record! { "a" => 2, "b" => "x" },
        ];
        let schema = Schema::from_keys(&["a", "b"]).unwrap();
        let (out, out_schema) = GroupBy::new(&["b", "a"]).apply(&records, &schema).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out_schema.key_order(), vec!["b", "a"]);
    }

    #[test]
    fn test_aggregate_error_is_execution_error() {
        let (records, schema) = staff();
        let op = GroupBy::new(&["salary"]).aggregate("total", AggregateFunc::sum("dept"));
        let err = op.apply(&records, &schema).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(err.operation(), "group_by");
        assert!(err.to_string().contains("non-numeric"));
    }

    #[test]
    fn test_average_of_large_integers() {
        let records = vec![
            record! { "k" => 1, "v" => i64::MAX },
            record! { "k" => 1, "v" => 1 },
        ];
        let schema = Schema::from_keys(&["k", "v"]).unwrap();
        let op = GroupBy::new(&["k"]).aggregate("avg", AggregateFunc::average("v"));
        let (out, _) = op.apply(&records, &schema).unwrap();
        assert_eq!(out[0].value("avg"), &Value::Float(4.611686018427388e18));

        let op = GroupBy::new(&["k"]).aggregate("total", AggregateFunc::sum("v"));
        let err = op.apply(&records, &schema).unwrap_err();
        assert_eq!(
            err.to_string(),
            "group_by: total: sum(v): integer overflow"
        );
    }

    #[test]
    fn test_configuration_errors() {
        let err = GroupBy::new::<&str>(&[]).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = GroupBy::new(&["dept"])
            .aggregate("dept", AggregateFunc::Count)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate output column: dept"));

        let (_, schema) = staff();
        let err = GroupBy::new(&["region"]).plan(&schema).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
