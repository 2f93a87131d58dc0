//! Row filtering by predicate

use std::fmt;
use std::sync::Arc;

use super::guarded;
use crate::error::PipelineError;
use crate::model::{Record, Schema};

/// Shared row predicate
pub type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Keeps the records a predicate accepts, in their original order.
#[derive(Clone, Default)]
pub struct Filter {
    predicate: Option<Predicate>,
}

impl Filter {
    pub const NAME: &'static str = "filter";

    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Arc::new(predicate)),
        }
    }

    /// Build from a predicate that may be absent. An absent predicate fails
    /// validation.
    pub fn from_predicate(predicate: Option<Predicate>) -> Self {
        Self { predicate }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.predicate.is_none() {
            return Err(PipelineError::configuration(
                Self::NAME,
                "predicate is required",
            ));
        }
        Ok(())
    }

    pub fn apply(
        &self,
        records: &[Record],
        schema: &Schema,
    ) -> Result<(Vec<Record>, Schema), PipelineError> {
        let Some(predicate) = &self.predicate else {
            return Err(PipelineError::configuration(
                Self::NAME,
                "predicate is required",
            ));
        };

        let mut kept = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let keep = guarded(|| predicate(record)).map_err(|msg| {
                PipelineError::execution(Self::NAME, format!("predicate panicked: {}", msg))
                    .with_record(index, record)
            })?;
            if keep {
                kept.push(record.clone());
            }
        }
        Ok((kept, schema.clone()))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
