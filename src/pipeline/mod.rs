//! Pipeline builder, validation and executor

mod context;
mod optimizer;
mod stats;

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::PipelineOptions;
use crate::error::PipelineError;
use crate::model::{Record, Table, Value};
use crate::ops::{GroupBy, Operation, SortDirection, SortKey};

pub use context::ExecutionContext;
pub use optimizer::optimize;
pub use stats::{ExecutionStats, OperationStats};

/// Ordered operations bound to a source table.
///
/// Building only records operations. Each execution validates them, optimizes
/// the list, runs it against a copy of the source and returns a new table; the
/// source is never modified, so a pipeline can be executed any number of
/// times, from any number of threads.
#[derive(Debug, Clone)]
pub struct Pipeline<'a> {
    source: &'a Table,
    operations: Vec<Operation>,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    /// Name used for errors raised outside of any single operation
    pub const NAME: &'static str = "pipeline";

    pub fn new(source: &'a Table) -> Self {
        Self {
            source,
            operations: Vec::new(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Append an operation
    pub fn push(mut self, operation: impl Into<Operation>) -> Self {
        self.operations.push(operation.into());
        self
    }

    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.push(Operation::filter(predicate))
    }

    pub fn sort(self, keys: Vec<SortKey>) -> Self {
        self.push(Operation::sort(keys))
    }

    pub fn sort_by(self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort(vec![SortKey::new(column, direction)])
    }

    pub fn limit(self, count: i64) -> Self {
        self.push(Operation::limit(count))
    }

    pub fn add_column<F, V>(self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Record) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.push(Operation::add_column(name, compute))
    }

    pub fn group_by(self, group_by: GroupBy) -> Self {
        self.push(Operation::group_by(group_by))
    }

    /// Operations in the order they were added
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Check limits and configuration without touching any record.
    ///
    /// Besides each operation's own arguments, the schema is traced through
    /// the list so that references to columns that cannot exist at that point
    /// are reported here.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let max = self.options.max_operations;
        if max > 0 && self.operations.len() > max {
            return Err(PipelineError::configuration(
                Self::NAME,
                format!(
                    "{} operations exceed the limit of {}",
                    self.operations.len(),
                    max
                ),
            ));
        }
        for op in &self.operations {
            op.validate()?;
        }
        let mut schema = self.source.schema_ref().clone();
        for op in &self.operations {
            schema = op.plan(&schema)?;
        }
        Ok(())
    }

    /// Execute with no external cancellation
    pub fn execute(&self) -> Result<Table, PipelineError> {
        self.execute_with(&ExecutionContext::new())
    }

    /// Execute, observing `ctx` before each operation.
    ///
    /// A cancelled context or an expired deadline aborts the run with an error
    /// naming the operation that was about to start.
    pub fn execute_with(&self, ctx: &ExecutionContext) -> Result<Table, PipelineError> {
        self.execute_with_stats(ctx).map(|(table, _)| table)
    }

    /// Execute and report per-operation statistics
    pub fn execute_with_stats(
        &self,
        ctx: &ExecutionContext,
    ) -> Result<(Table, ExecutionStats), PipelineError> {
        let result = self.run(ctx);
        if let Err(err) = &result {
            warn!(
                operation = err.operation(),
                kind = ?err.kind(),
                error = %err,
                "pipeline execution failed"
            );
        }
        result
    }

    fn run(&self, ctx: &ExecutionContext) -> Result<(Table, ExecutionStats), PipelineError> {
        let started = Instant::now();
        self.validate()?;

        let operations = if self.options.optimize {
            optimize(&self.operations)
        } else {
            self.operations.clone()
        };
        let optimized = operations.len() != self.operations.len()
            || operations
                .iter()
                .zip(&self.operations)
                .any(|(a, b)| a.name() != b.name());

        let limit = self.options.max_execution_time;
        let deadline = (!limit.is_zero()).then(|| started + limit);
        let ctx = ctx.narrowed(deadline);

        let mut records = self.source.records_ref().to_vec();
        let mut schema = self.source.schema_ref().clone();
        let mut stats = ExecutionStats {
            input_records: records.len(),
            optimized,
            ..ExecutionStats::default()
        };

        if operations.is_empty() {
            ctx.check(Self::NAME)?;
        }

        for op in &operations {
            let op_started = Instant::now();
            let input_records = records.len();
            let (next_records, next_schema) = op.apply(&ctx, &records, &schema)?;
            records = next_records;
            schema = next_schema;

            let duration = op_started.elapsed();
            debug!(
                operation = op.name(),
                input_records,
                output_records = records.len(),
                ?duration,
                "operation applied"
            );
            stats.operations.push(OperationStats {
                name: op.name(),
                input_records,
                output_records: records.len(),
                duration,
            });
        }

        stats.output_records = records.len();
        stats.duration = started.elapsed();
        info!(
            operations = stats.operations.len(),
            input_records = stats.input_records,
            output_records = stats.output_records,
            optimized,
            duration = ?stats.duration,
            "pipeline executed"
        );

        Ok((Table::derived(schema, records), stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CancelCause, ErrorKind};
    use crate::ops::AggregateFunc;
    use crate::record;
    use std::time::Duration;

    fn table() -> Table {
        Table::with_key_order(
            &["id", "value", "active"],
            vec![
                record! { "id" => 1, "value" => 10, "active" => true },
                record! { "id" => 2, "value" => 25, "active" => false },
                record! { "id" => 3, "value" => 30, "active" => true },
            ],
        )
        .unwrap()
    }

    fn active(r: &Record) -> bool {
        r.value("active").as_bool().unwrap_or(false)
    }

    #[test]
    fn test_filter_sort_limit() {
        let source = table();
        let out = source
            .pipeline()
            .filter(active)
            .sort_by("value", SortDirection::Descending)
            .limit(1)
            .execute()
            .unwrap();
        assert_eq!(
            out.records(),
            vec![record! { "id" => 3, "value" => 30, "active" => true }]
        );
        assert_eq!(out.key_order(), vec!["id", "value", "active"]);
        assert_eq!(source.record_count(), 3);
    }

    #[test]
    fn test_stats() {
        let source = table();
        let (_, stats) = source
            .pipeline()
            .sort_by("value", SortDirection::Ascending)
            .filter(active)
            .execute_with_stats(&ExecutionContext::new())
            .unwrap();
        assert!(stats.optimized);
        let names: Vec<_> = stats.operations.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["filter", "sort"]);
        assert_eq!(stats.operations[0].input_records, 3);
        assert_eq!(stats.operations[0].output_records, 2);
        assert_eq!(stats.dropped_records(), 1);
    }

    #[test]
    fn test_max_operations_fails_before_running() {
        let source = table();
        let err = source
            .pipeline()
            .with_options(PipelineOptions::default().with_max_operations(1))
            .filter(|_| panic!("must not run"))
            .limit(1)
            .execute()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.operation(), "pipeline");
    }

    #[test]
    fn test_configuration_error_precedes_execution() {
        let source = table();
        let err = source
            .pipeline()
            .filter(|_| panic!("must not run"))
            .limit(-1)
            .execute()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.operation(), "limit");
    }

    #[test]
    fn test_unknown_sort_column_detected_through_schema_flow() {
        let source = table();
        let err = source
            .pipeline()
            .group_by(GroupBy::new(&["active"]).aggregate("n", AggregateFunc::Count))
            .sort_by("value", SortDirection::Ascending)
            .execute()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.operation(), "sort");

        // a column added earlier in the pipeline is fine
        let out = source
            .pipeline()
            .add_column("score", |r: &Record| r.value("value").as_i64().map(|v| -v))
            .sort_by("score", SortDirection::Ascending)
            .execute()
            .unwrap();
        assert_eq!(out.record(0).unwrap().value("id"), &Value::Int(3));
    }

    #[test]
    fn test_precancelled_context() {
        let source = table();
        let ctx = ExecutionContext::new();
        ctx.cancel();
        let err = source
            .pipeline()
            .filter(active)
            .execute_with(&ctx)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::cancelled("filter", CancelCause::Cancelled)
        );
        assert!(err.is_retryable());

        let err = source.pipeline().execute_with(&ctx).unwrap_err();
        assert_eq!(err.operation(), "pipeline");
    }

    #[test]
    fn test_deadline_names_next_operation() {
        let source = table();
        let err = source
            .pipeline()
            .with_options(
                PipelineOptions::default().with_max_execution_time(Duration::from_millis(20)),
            )
            .filter(|_| {
                std::thread::sleep(Duration::from_millis(15));
                true
            })
            .limit(10)
            .execute()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(matches!(
            err,
            PipelineError::Cancelled {
                cause: CancelCause::DeadlineExceeded,
                ..
            }
        ));
        assert_eq!(err.operation(), "limit");
    }

    #[test]
    fn test_optimizer_can_be_disabled() {
        let source = table();
        let (_, stats) = source
            .pipeline()
            .with_options(PipelineOptions::default().with_optimize(false))
            .sort_by("value", SortDirection::Ascending)
            .filter(active)
            .execute_with_stats(&ExecutionContext::new())
            .unwrap();
        assert!(!stats.optimized);
        assert_eq!(stats.operations[0].name, "sort");
    }
}
