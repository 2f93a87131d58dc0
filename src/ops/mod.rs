//! Transformation steps over records and their schema

mod add_column;
mod aggregate;
mod filter;
mod group_by;
mod limit;
mod sort;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::PipelineError;
use crate::model::{Record, Schema, Value};
use crate::pipeline::ExecutionContext;

pub use add_column::{AddColumn, ComputeFn};
pub use aggregate::{AggregateFunc, Reducer};
pub use filter::{Filter, Predicate};
pub use group_by::GroupBy;
pub use limit::Limit;
pub use sort::{Sort, SortDirection, SortKey};

/// One pipeline step.
///
/// Operations are values: they hold no reference to any table, never modify
/// the records or schema handed to them, and are cheap to clone.
#[derive(Debug, Clone)]
pub enum Operation {
    Filter(Filter),
    Sort(Sort),
    Limit(Limit),
    AddColumn(AddColumn),
    GroupBy(GroupBy),
}

impl Operation {
    /// Keep records matching `predicate`
    pub fn filter<F>(predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Operation::Filter(Filter::new(predicate))
    }

    /// Stable multi-key sort
    pub fn sort(keys: Vec<SortKey>) -> Self {
        Operation::Sort(Sort::new(keys))
    }

    /// Keep the first `count` records
    pub fn limit(count: i64) -> Self {
        Operation::Limit(Limit::new(count))
    }

    /// Append a computed column
    pub fn add_column<F, V>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Record) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Operation::AddColumn(AddColumn::new(name, compute))
    }

    /// Group records and aggregate each group
    pub fn group_by(group_by: GroupBy) -> Self {
        Operation::GroupBy(group_by)
    }

    /// Stable name used to prefix errors and log lines
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Filter(_) => Filter::NAME,
            Operation::Sort(_) => Sort::NAME,
            Operation::Limit(_) => Limit::NAME,
            Operation::AddColumn(_) => AddColumn::NAME,
            Operation::GroupBy(_) => GroupBy::NAME,
        }
    }

    /// Check the operation's own arguments without looking at any data
    pub fn validate(&self) -> Result<(), PipelineError> {
        match self {
            Operation::Filter(op) => op.validate(),
            Operation::Sort(op) => op.validate(),
            Operation::Limit(op) => op.validate(),
            Operation::AddColumn(op) => op.validate(),
            Operation::GroupBy(op) => op.validate(),
        }
    }

    /// Schema this operation would produce from `input`, without touching records.
    ///
    /// Used to catch configuration errors that depend on the columns flowing
    /// into an operation (for example a sort on a column that does not exist).
    pub fn plan(&self, input: &Schema) -> Result<Schema, PipelineError> {
        match self {
            Operation::Filter(_) | Operation::Limit(_) => Ok(input.clone()),
            Operation::Sort(op) => op.plan(input),
            Operation::AddColumn(op) => op.plan(input),
            Operation::GroupBy(op) => op.plan(input),
        }
    }

    /// Apply the operation, returning new records and a new schema.
    ///
    /// Cancellation is checked once, before any record is read.
    pub fn apply(
        &self,
        ctx: &ExecutionContext,
        records: &[Record],
        schema: &Schema,
    ) -> Result<(Vec<Record>, Schema), PipelineError> {
        ctx.check(self.name())?;
        self.validate()?;
        match self {
            Operation::Filter(op) => op.apply(records, schema),
            Operation::Sort(op) => op.apply(records, schema),
            Operation::Limit(op) => op.apply(records, schema),
            Operation::AddColumn(op) => op.apply(records, schema),
            Operation::GroupBy(op) => op.apply(records, schema),
        }
    }

    pub fn is_filter(&self) -> bool {
        matches!(self, Operation::Filter(_))
    }

    pub fn is_sort(&self) -> bool {
        matches!(self, Operation::Sort(_))
    }
}

impl From<Filter> for Operation {
    fn from(op: Filter) -> Self {
        Operation::Filter(op)
    }
}

impl From<Sort> for Operation {
    fn from(op: Sort) -> Self {
        Operation::Sort(op)
    }
}

impl From<Limit> for Operation {
    fn from(op: Limit) -> Self {
        Operation::Limit(op)
    }
}

impl From<AddColumn> for Operation {
    fn from(op: AddColumn) -> Self {
        Operation::AddColumn(op)
    }
}

impl From<GroupBy> for Operation {
    fn from(op: GroupBy) -> Self {
        Operation::GroupBy(op)
    }
}

/// Run a user closure, turning a panic into its message.
pub(crate) fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CancelCause, ErrorKind};
    use crate::record;

    #[test]
    fn test_guarded_captures_panic_message() {
        assert_eq!(guarded(|| 5), Ok(5));
        let err = guarded(|| -> i32 { panic!("bad row") }).unwrap_err();
        assert_eq!(err, "bad row");
        let err = guarded(|| -> i32 { panic!("{} rows", 3) }).unwrap_err();
        assert_eq!(err, "3 rows");
    }

    #[test]
    fn test_apply_checks_cancellation_first() {
        let ctx = ExecutionContext::new();
        ctx.cancel();
        let err = Operation::limit(1)
            .apply(&ctx, &[record! { "a" => 1 }], &Schema::new())
            .unwrap_err();
        assert_eq!(err, PipelineError::cancelled("limit", CancelCause::Cancelled));
    }

    #[test]
    fn test_apply_validates_before_touching_records() {
        let err = Operation::limit(-1)
            .apply(&ExecutionContext::new(), &[], &Schema::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.operation(), "limit");
    }

    #[test]
    fn test_names() {
        assert_eq!(Operation::filter(|_| true).name(), "filter");
        assert_eq!(Operation::sort(vec![SortKey::asc("a")]).name(), "sort");
        assert_eq!(Operation::add_column("x", |_| 1).name(), "add_column");
        assert_eq!(
            Operation::group_by(GroupBy::new(&["a"]).aggregate("n", AggregateFunc::Count)).name(),
            "group_by"
        );
    }
}
