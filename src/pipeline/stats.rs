//! Execution statistics

use std::time::Duration;

use serde::Serialize;

/// Figures for one executed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub name: &'static str,
    pub input_records: usize,
    pub output_records: usize,
    pub duration: Duration,
}

/// Figures for one pipeline execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    pub input_records: usize,
    pub output_records: usize,
    /// Whether the optimizer rewrote the operation list
    pub optimized: bool,
    /// Executed operations, in execution order
    pub operations: Vec<OperationStats>,
    pub duration: Duration,
}

impl ExecutionStats {
    /// Records removed between input and output
    pub fn dropped_records(&self) -> usize {
        self.input_records.saturating_sub(self.output_records)
    }
}
