//! Stable multi-key sorting

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, SortError};
use crate::model::{Record, Schema};

/// Sort direction for one key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            _ => Err(format!("Unknown sort direction: {}", s)),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "asc"),
            SortDirection::Descending => write!(f, "desc"),
        }
    }
}

/// A column and the direction to sort it in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Ascending)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Descending)
    }
}

/// Parses `column` or `column:asc|desc`
impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, direction) = match s.rsplit_once(':') {
            Some((column, dir)) => (column, dir.parse()?),
            None => (s, SortDirection::Ascending),
        };
        if column.is_empty() {
            return Err(format!("Missing sort column in: {}", s));
        }
        Ok(Self::new(column, direction))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.column, self.direction)
    }
}

/// Stable sort on one or more keys; later keys break ties of earlier ones.
///
/// Nulls and missing values sort first ascending and last descending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    keys: Vec<SortKey>,
}

impl Sort {
    pub const NAME: &'static str = "sort";

    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Sort on a single column
    pub fn by(column: impl Into<String>, direction: SortDirection) -> Self {
        Self::new(vec![SortKey::new(column, direction)])
    }

    /// Add a tie-breaking key
    pub fn then_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push(SortKey::new(column, direction));
        self
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.keys.is_empty() {
            return Err(PipelineError::configuration(
                Self::NAME,
                "at least one sort key is required",
            ));
        }
        if let Some(key) = self.keys.iter().find(|k| k.column.is_empty()) {
            return Err(PipelineError::configuration(
                Self::NAME,
                format!("empty column name in sort key {}", key),
            ));
        }
        Ok(())
    }

    pub fn plan(&self, input: &Schema) -> Result<Schema, PipelineError> {
        match self.unknown_column(input) {
            Some(column) => Err(PipelineError::configuration(
                Self::NAME,
                SortError::UnknownColumn(column.to_string()).to_string(),
            )),
            None => Ok(input.clone()),
        }
    }

    pub fn apply(
        &self,
        records: &[Record],
        schema: &Schema,
    ) -> Result<(Vec<Record>, Schema), PipelineError> {
        if let Some(column) = self.unknown_column(schema) {
            return Err(sort_failure(SortError::UnknownColumn(column.to_string())));
        }

        let order = self.sorted_indices(records).map_err(sort_failure)?;
        let sorted = order.into_iter().map(|i| records[i].clone()).collect();
        Ok((sorted, schema.clone()))
    }

    /// Indices of `records` in sorted order.
    ///
    /// Comparability is checked up front so the comparator handed to
    /// `sort_by` is a consistent total order.
    fn sorted_indices(&self, records: &[Record]) -> Result<Vec<usize>, SortError> {
        for key in &self.keys {
            check_comparable(&key.column, records)?;
        }
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| self.compare(&records[a], &records[b]));
        Ok(order)
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.keys {
            let ord = a
                .value(&key.column)
                .try_cmp(b.value(&key.column))
                .unwrap_or(Ordering::Equal);
            let ord = match key.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn unknown_column<'a>(&'a self, schema: &Schema) -> Option<&'a str> {
        self.keys
            .iter()
            .map(|k| k.column.as_str())
            .find(|c| !schema.has_field(c))
    }
}

/// Every non-null value of `column` must be orderable against every other.
///
/// Comparable kinds form disjoint classes, so checking against the first
/// non-null value is enough.
fn check_comparable(column: &str, records: &[Record]) -> Result<(), SortError> {
    let mut values = records.iter().map(|r| r.value(column)).filter(|v| !v.is_null());
    let Some(first) = values.next() else {
        return Ok(());
    };
    for value in values {
        if first.try_cmp(value).is_none() {
            return Err(SortError::TypeMismatch {
                column: column.to_string(),
                left: first.type_name(),
                right: value.type_name(),
            });
        }
    }
    Ok(())
}

fn sort_failure(err: SortError) -> PipelineError {
    PipelineError::Sort(err)
}
