//! Per-run metric

use serde::{Deserialize, Serialize};

/// Observed outcome of one worker execution
///
/// The load figures are the last sample taken before the worker exited,
/// not an average over its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetric {
    /// System-wide CPU utilization, percent
    pub cpu_load: f64,

    /// System-wide memory utilization, percent
    pub memory_load: f64,

    /// Whether the worker exited with code 0
    pub succeeded: bool,

    /// Exit code, if the worker exited normally
    pub exit_code: Option<i32>,

    /// Wall-clock lifetime of the worker process
    pub elapsed_ms: u64,

    /// Number of sampling ticks taken while the worker ran
    pub samples: u32,
}

impl RunMetric {
    /// Builds a metric from an exit code and the last observed sample
    pub fn from_exit(
        exit_code: Option<i32>,
        cpu_load: f64,
        memory_load: f64,
        elapsed_ms: u64,
        samples: u32,
    ) -> Self {
        Self {
            cpu_load,
            memory_load,
            succeeded: exit_code == Some(0),
            exit_code,
            elapsed_ms,
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_only_on_zero() {
        assert!(RunMetric::from_exit(Some(0), 1.0, 2.0, 10, 1).succeeded);
        assert!(!RunMetric::from_exit(Some(7), 1.0, 2.0, 10, 1).succeeded);
        assert!(!RunMetric::from_exit(Some(-1), 1.0, 2.0, 10, 1).succeeded);
        assert!(!RunMetric::from_exit(None, 1.0, 2.0, 10, 1).succeeded);
    }
}
