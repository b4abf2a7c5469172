//! Job domain types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A benchmark job
///
/// One configured workload: the worker is launched `repetitions` times with
/// the same arguments, at most `max_concurrency` at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Memory the worker should allocate, in MiB
    #[serde(rename = "memoryCount", alias = "memorySizeMB")]
    pub memory_mb: u32,

    /// How long each worker run should last, in milliseconds
    #[serde(rename = "appTimeout", alias = "perRunTimeoutMs")]
    pub timeout_ms: f64,

    /// Number of unconditional executions of the worker
    #[serde(rename = "tryCount", alias = "repetitionCount")]
    pub repetitions: u32,

    /// Upper bound on concurrently running repetitions for this job
    #[serde(rename = "maxThreads", alias = "maxConcurrency")]
    pub max_concurrency: u32,
}

/// Reasons a job definition is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobValidationError {
    #[error("maxThreads must be at least 1")]
    ZeroConcurrency,

    #[error("appTimeout must be a finite, non-negative number of milliseconds (got {0})")]
    InvalidTimeout(f64),
}

impl Job {
    /// Creates a new job
    pub fn new(memory_mb: u32, timeout_ms: f64, repetitions: u32, max_concurrency: u32) -> Self {
        Self {
            memory_mb,
            timeout_ms,
            repetitions,
            max_concurrency,
        }
    }

    /// Checks the invariants that the type system does not
    pub fn validate(&self) -> Result<(), JobValidationError> {
        if self.max_concurrency == 0 {
            return Err(JobValidationError::ZeroConcurrency);
        }

        if !self.timeout_ms.is_finite() || self.timeout_ms < 0.0 {
            return Err(JobValidationError::InvalidTimeout(self.timeout_ms));
        }

        Ok(())
    }

    /// Positional arguments passed to the worker: `<timeout_ms> <memory_mb>`
    pub fn worker_args(&self) -> Vec<String> {
        vec![self.timeout_ms.to_string(), self.memory_mb.to_string()]
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "memory={}MB timeout={}ms repetitions={} max_threads={}",
            self.memory_mb, self.timeout_ms, self.repetitions, self.max_concurrency
        )
    }
}
