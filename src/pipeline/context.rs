//! Cancellation and deadline state observed between operations

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{CancelCause, PipelineError};

/// Execution context passed to every operation.
///
/// Cloning shares the cancellation token, so cancelling any clone cancels all
/// of them.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecutionContext {
    /// A context that is never cancelled and has no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe an existing cancellation token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Token shared by this context and its clones
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Copy of this context whose deadline is the earlier of its own and `deadline`
    pub fn narrowed(&self, deadline: Option<Instant>) -> Self {
        let deadline = match (self.deadline, deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            token: self.token.clone(),
            deadline,
        }
    }

    /// Fail with a cancellation error attributed to `operation` if the context
    /// was cancelled or its deadline has passed.
    pub fn check(&self, operation: &'static str) -> Result<(), PipelineError> {
        if self.token.is_cancelled() {
            return Err(PipelineError::cancelled(operation, CancelCause::Cancelled));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(PipelineError::cancelled(
                operation,
                CancelCause::DeadlineExceeded,
            )),
            _ => Ok(()),
        }
    }
}
