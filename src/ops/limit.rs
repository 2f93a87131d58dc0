//! Truncation to the first n records

use crate::error::PipelineError;
use crate::model::{Record, Schema};

/// Keeps the first `count` records of the current order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    count: i64,
}

impl Limit {
    pub const NAME: &'static str = "limit";

    /// Negative counts are accepted here and rejected by [`Limit::validate`].
    pub fn new(count: i64) -> Self {
        Self { count }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.count < 0 {
            return Err(PipelineError::configuration(
                Self::NAME,
                format!("count must be >= 0, got {}", self.count),
            ));
        }
        Ok(())
    }

    pub fn apply(
        &self,
        records: &[Record],
        schema: &Schema,
    ) -> Result<(Vec<Record>, Schema), PipelineError> {
        self.validate()?;
        let n = usize::try_from(self.count).unwrap_or(usize::MAX);
        let kept = records.iter().take(n).cloned().collect();
        Ok((kept, schema.clone()))
    }

    /// `Limit(a)` followed by `Limit(b)` keeps `min(a, b)` records
    pub fn merge(self, next: Limit) -> Limit {
        Limit::new(self.count.min(next.count))
    }
}
