//! Reducers used by group-by

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::guarded;
use crate::error::AggregateError;
use crate::model::{FieldType, Record, Schema, Value};

/// Shared custom reducer over the records of one group
pub type Reducer = Arc<dyn Fn(&[&Record]) -> Value + Send + Sync>;

/// Reduces one group of records to a single value.
///
/// Numeric policy:
/// - nulls and missing fields are skipped by every column reducer;
/// - `Sum` stays integral while every value is an `Int` (overflow is an
///   error) and becomes a `Float` as soon as a `Float` is seen;
/// - `Sum` and `Average` reject non-numeric values with an error instead of
///   coercing them;
/// - `Average` never overflows and is null for a group with no numeric values.
#[derive(Clone)]
pub enum AggregateFunc {
    /// Number of records in the group
    Count,
    Sum(String),
    Average(String),
    /// Smallest value; the first one seen wins ties
    Min(String),
    /// Largest value; the first one seen wins ties
    Max(String),
    Custom { name: String, reducer: Reducer },
}

impl AggregateFunc {
    pub fn sum(column: impl Into<String>) -> Self {
        AggregateFunc::Sum(column.into())
    }

    pub fn average(column: impl Into<String>) -> Self {
        AggregateFunc::Average(column.into())
    }

    pub fn min(column: impl Into<String>) -> Self {
        AggregateFunc::Min(column.into())
    }

    pub fn max(column: impl Into<String>) -> Self {
        AggregateFunc::Max(column.into())
    }

    pub fn custom<F>(name: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(&[&Record]) -> Value + Send + Sync + 'static,
    {
        AggregateFunc::Custom {
            name: name.into(),
            reducer: Arc::new(reducer),
        }
    }

    /// Function name used in messages
    pub fn function_name(&self) -> &str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum(_) => "sum",
            AggregateFunc::Average(_) => "average",
            AggregateFunc::Min(_) => "min",
            AggregateFunc::Max(_) => "max",
            AggregateFunc::Custom { name, .. } => name,
        }
    }

    /// Input column, for the reducers that read one
    pub fn column(&self) -> Option<&str> {
        match self {
            AggregateFunc::Sum(c)
            | AggregateFunc::Average(c)
            | AggregateFunc::Min(c)
            | AggregateFunc::Max(c) => Some(c),
            AggregateFunc::Count | AggregateFunc::Custom { .. } => None,
        }
    }

    /// Type hint of the output column given the input schema
    pub fn output_type(&self, input: &Schema) -> FieldType {
        let input_type = || {
            self.column()
                .and_then(|c| input.find_field(c))
                .map_or(FieldType::Unknown, |f| f.field_type)
        };
        match self {
            AggregateFunc::Count => FieldType::Int,
            AggregateFunc::Average(_) => FieldType::Float,
            AggregateFunc::Sum(_) => match input_type() {
                FieldType::Int => FieldType::Int,
                FieldType::Float => FieldType::Float,
                _ => FieldType::Unknown,
            },
            AggregateFunc::Min(_) | AggregateFunc::Max(_) => input_type(),
            AggregateFunc::Custom { .. } => FieldType::Unknown,
        }
    }

    /// Reduce one group
    pub fn reduce(&self, group: &[&Record]) -> Result<Value, AggregateError> {
        match self {
            AggregateFunc::Count => Ok(Value::from(group.len())),
            AggregateFunc::Sum(column) => numeric_sum("sum", column, group),
            AggregateFunc::Average(column) => numeric_mean("average", column, group),
            AggregateFunc::Min(column) => extreme("min", column, group, Ordering::Less),
            AggregateFunc::Max(column) => extreme("max", column, group, Ordering::Greater),
            AggregateFunc::Custom { name, reducer } => {
                guarded(|| reducer(group)).map_err(|message| AggregateError::Panicked {
                    name: name.clone(),
                    message,
                })
            }
        }
    }
}

/// Running numeric sum
enum Acc {
    Int(i64),
    Float(f64),
}

/// Sum of the non-null values of `column`; `Int(0)` for an empty group.
/// Integer overflow is an error.
fn numeric_sum(
    function: &'static str,
    column: &str,
    group: &[&Record],
) -> Result<Value, AggregateError> {
    let mut acc = Acc::Int(0);
    for record in group {
        acc = match (acc, record.value(column)) {
            (acc, Value::Null) => acc,
            (Acc::Int(a), Value::Int(b)) => {
                Acc::Int(a.checked_add(*b).ok_or_else(|| AggregateError::Overflow {
                    function,
                    column: column.to_string(),
                })?)
            }
            (Acc::Int(a), Value::Float(b)) => Acc::Float(a as f64 + b),
            (Acc::Float(a), Value::Int(b)) => Acc::Float(a + *b as f64),
            (Acc::Float(a), Value::Float(b)) => Acc::Float(a + b),
            (_, other) => {
                return Err(AggregateError::NonNumeric {
                    function,
                    column: column.to_string(),
                    found: other.type_name(),
                })
            }
        };
    }
    Ok(match acc {
        Acc::Int(i) => Value::Int(i),
        Acc::Float(f) => Value::Float(f),
    })
}

/// Mean of the non-null values of `column`, or null when there are none.
///
/// Integers are summed in `i128`, so a group whose integer total does not fit
/// in `i64` still has an average.
fn numeric_mean(
    function: &'static str,
    column: &str,
    group: &[&Record],
) -> Result<Value, AggregateError> {
    let mut ints: i128 = 0;
    let mut floats = 0.0f64;
    let mut n = 0usize;
    for record in group {
        match record.value(column) {
            Value::Null => continue,
            Value::Int(i) => ints += i128::from(*i),
            Value::Float(f) => floats += f,
            other => {
                return Err(AggregateError::NonNumeric {
                    function,
                    column: column.to_string(),
                    found: other.type_name(),
                })
            }
        }
        n += 1;
    }
    if n == 0 {
        return Ok(Value::Null);
    }
    Ok(Value::Float((ints as f64 + floats) / n as f64))
}

/// Min or max of the non-null values of `column`; `wanted` is the ordering a
/// candidate must have against the current best to replace it.
fn extreme(
    function: &'static str,
    column: &str,
    group: &[&Record],
    wanted: Ordering,
) -> Result<Value, AggregateError> {
    let mut best: Option<&Value> = None;
    for record in group {
        let value = record.value(column);
        if value.is_null() {
            continue;
        }
        best = match best {
            None => Some(value),
            Some(current) => {
                let ord = value
                    .try_cmp(current)
                    .ok_or_else(|| AggregateError::Incomparable {
                        function,
                        column: column.to_string(),
                        left: current.type_name(),
                        right: value.type_name(),
                    })?;
                if ord == wanted {
                    Some(value)
                } else {
                    Some(current)
                }
            }
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

impl fmt::Debug for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunc::Custom { name, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .finish_non_exhaustive(),
            other => match other.column() {
                Some(column) => write!(f, "{}({})", other.function_name(), column),
                None => write!(f, "{}", other.function_name()),
            },
        }
    }
}

/// Parses `count`, `sum:col`, `avg:col` / `average:col`, `min:col`, `max:col`
impl FromStr for AggregateFunc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (func, column) = match s.split_once(':') {
            Some((func, column)) => (func, Some(column)),
            None => (s, None),
        };
        let need_column = || match column {
            Some(c) if !c.is_empty() => Ok(c.to_string()),
            _ => Err(format!("Aggregate {} requires a column: {}:<column>", func, func)),
        };
        match func.to_lowercase().as_str() {
            "count" => Ok(AggregateFunc::Count),
            "sum" => need_column().map(AggregateFunc::Sum),
            "avg" | "average" | "mean" => need_column().map(AggregateFunc::Average),
            "min" => need_column().map(AggregateFunc::Min),
            "max" => need_column().map(AggregateFunc::Max),
            _ => Err(format!("Unknown aggregate function: {}", func)),
        }
    }
}
