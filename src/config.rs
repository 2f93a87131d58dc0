//! Configuration handling for pipeline execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cap on the number of operations in one pipeline
pub const DEFAULT_MAX_OPERATIONS: usize = 100;

/// Default wall-clock budget for one execution
pub const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(30);

/// Resource limits and switches for pipeline execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Maximum number of operations; checked before anything runs.
    /// Zero disables the check.
    pub max_operations: usize,
    /// Wall-clock budget, checked between operations. Zero disables the check.
    pub max_execution_time: Duration,
    /// Run the optimizer before execution
    pub optimize: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_operations: DEFAULT_MAX_OPERATIONS,
            max_execution_time: DEFAULT_MAX_EXECUTION_TIME,
            optimize: true,
        }
    }
}

impl PipelineOptions {
    /// Create options with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with every limit disabled
    pub fn unlimited() -> Self {
        Self {
            max_operations: 0,
            max_execution_time: Duration::ZERO,
            optimize: true,
        }
    }

    /// Set the maximum number of operations
    pub fn with_max_operations(mut self, max: usize) -> Self {
        self.max_operations = max;
        self
    }

    /// Set the execution time budget
    pub fn with_max_execution_time(mut self, limit: Duration) -> Self {
        self.max_execution_time = limit;
        self
    }

    /// Enable or disable the optimizer
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Load options from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.max_operations, 100);
        assert_eq!(opts.max_execution_time, Duration::from_secs(30));
        assert!(opts.optimize);
    }

    #[test]
    fn test_from_json_partial() {
        let opts = PipelineOptions::from_json(r#"{"max_operations": 5, "optimize": false}"#).unwrap();
        assert_eq!(opts.max_operations, 5);
        assert!(!opts.optimize);
        assert_eq!(opts.max_execution_time, DEFAULT_MAX_EXECUTION_TIME);
    }
}
