//! Error types for the model and the transformation pipeline

use std::fmt;

use thiserror::Error;

use crate::model::Record;

/// Errors raised while building schemas and tables
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    #[error("field name must not be empty")]
    EmptyFieldName,
}

/// Broad classification of a [`PipelineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid operation arguments, detected before any record is touched
    Configuration,
    /// A fault inside user-supplied logic or an operation's own logic
    Execution,
    /// The execution was cancelled or ran past its deadline
    Cancelled,
}

/// Why an execution stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelCause {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Cancelled => write!(f, "context canceled"),
            CancelCause::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// The row that triggered an execution error
#[derive(Debug, Clone, PartialEq)]
pub struct RecordContext {
    /// Position of the record in the operation's input
    pub index: usize,
    pub record: Record,
}

/// Error returned by operations and pipelines.
///
/// Every variant names the operation that failed (`"pipeline"` for checks that
/// run before any operation).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("{operation}: invalid configuration: {message}")]
    Configuration {
        operation: &'static str,
        message: String,
    },
    #[error(
        "{operation}: {message}{}",
        .record.as_ref().map(|r| format!(" (record {}: {})", r.index, r.record)).unwrap_or_default()
    )]
    Execution {
        operation: &'static str,
        message: String,
        record: Option<Box<RecordContext>>,
    },
    /// A sort failed at execution time; an execution error of `sort`
    #[error("sort: {0}")]
    Sort(SortError),
    #[error("{operation}: {cause}")]
    Cancelled {
        operation: &'static str,
        cause: CancelCause,
    },
}

impl PipelineError {
    pub fn configuration(operation: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Configuration {
            operation,
            message: message.into(),
        }
    }

    pub fn execution(operation: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Execution {
            operation,
            message: message.into(),
            record: None,
        }
    }

    pub fn cancelled(operation: &'static str, cause: CancelCause) -> Self {
        PipelineError::Cancelled { operation, cause }
    }

    /// Attach the offending record to an execution error. Other kinds are
    /// returned unchanged.
    pub fn with_record(self, index: usize, record: &Record) -> Self {
        match self {
            PipelineError::Execution {
                operation, message, ..
            } => PipelineError::Execution {
                operation,
                message,
                record: Some(Box::new(RecordContext {
                    index,
                    record: record.clone(),
                })),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration { .. } => ErrorKind::Configuration,
            PipelineError::Execution { .. } | PipelineError::Sort(_) => ErrorKind::Execution,
            PipelineError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Name of the operation that failed
    pub fn operation(&self) -> &'static str {
        match self {
            PipelineError::Configuration { operation, .. }
            | PipelineError::Execution { operation, .. }
            | PipelineError::Cancelled { operation, .. } => operation,
            PipelineError::Sort(_) => "sort",
        }
    }

    /// The offending record, when one is known
    pub fn record(&self) -> Option<&RecordContext> {
        match self {
            PipelineError::Execution { record, .. } => record.as_deref(),
            _ => None,
        }
    }

    /// The underlying sort failure, for callers that match on its cause
    pub fn sort_error(&self) -> Option<&SortError> {
        match self {
            PipelineError::Sort(err) => Some(err),
            _ => None,
        }
    }

    /// Cancellation and timeouts may succeed on a retry; other errors will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }
}

/// Comparison failures raised while sorting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
    #[error("unknown sort column: {0}")]
    UnknownColumn(String),
    #[error("cannot compare {left} with {right} in column {column}")]
    TypeMismatch {
        column: String,
        left: &'static str,
        right: &'static str,
    },
}

/// Failures raised while reducing a group
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("{function}({column}): non-numeric value of type {found}")]
    NonNumeric {
        function: &'static str,
        column: String,
        found: &'static str,
    },
    #[error("{function}({column}): integer overflow")]
    Overflow {
        function: &'static str,
        column: String,
    },
    #[error("{function}({column}): cannot compare {left} with {right}")]
    Incomparable {
        function: &'static str,
        column: String,
        left: &'static str,
        right: &'static str,
    },
    #[error("{name}: aggregate panicked: {message}")]
    Panicked { name: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn test_messages_carry_operation_name() {
        let err = PipelineError::configuration("limit", "count must be >= 0, got -1");
        assert_eq!(
            err.to_string(),
            "limit: invalid configuration: count must be >= 0, got -1"
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = PipelineError::cancelled("sort", CancelCause::DeadlineExceeded);
        assert_eq!(err.to_string(), "sort: deadline exceeded");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_with_record() {
        let err = PipelineError::execution("filter", "predicate panicked: boom")
            .with_record(2, &record! { "id" => 7 });
        assert_eq!(
            err.to_string(),
            "filter: predicate panicked: boom (record 2: {id: 7})"
        );
        assert_eq!(err.record().unwrap().index, 2);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_sort_error_stays_typed() {
        let cause = SortError::TypeMismatch {
            column: "v".to_string(),
            left: "int",
            right: "string",
        };
        let err = PipelineError::Sort(cause.clone()).with_record(0, &record! { "v" => 1 });
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(err.operation(), "sort");
        assert_eq!(err.sort_error(), Some(&cause));
        assert!(err.record().is_none());
        assert_eq!(
            err.to_string(),
            "sort: cannot compare int with string in column v"
        );
        assert_eq!(PipelineError::execution("sort", "x").sort_error(), None);
    }
}
