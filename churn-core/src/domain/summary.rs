//! Aggregation of run metrics
//!
//! A summary is a pure fold over [`RunMetric`]s. An empty fold is valid:
//! means are 0.0 and [`RunSummary::has_data`] reports false.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::metric::RunMetric;

/// Aggregate over a set of runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_elapsed_ms: u64,
    pub mean_cpu_load: f64,
    pub mean_memory_load: f64,
    pub success_count: usize,
    pub failure_count: usize,
}

impl RunSummary {
    /// Total number of runs folded into this summary
    pub fn run_count(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// False when no run contributed; the means are then 0.0 by definition
    pub fn has_data(&self) -> bool {
        self.run_count() > 0
    }

    /// Folds another summary into this one
    ///
    /// Means are weighted by run count, so merging job summaries gives the
    /// same means as summarizing all of their metrics at once.
    pub fn merge(&mut self, other: &RunSummary) {
        let ours = self.run_count() as f64;
        let theirs = other.run_count() as f64;
        let total = ours + theirs;

        if total > 0.0 {
            self.mean_cpu_load =
                (self.mean_cpu_load * ours + other.mean_cpu_load * theirs) / total;
            self.mean_memory_load =
                (self.mean_memory_load * ours + other.mean_memory_load * theirs) / total;
        }

        self.total_elapsed_ms += other.total_elapsed_ms;
        self.success_count += other.success_count;
        self.failure_count += other.failure_count;
    }
}

/// Summarizes a set of metrics collected over `elapsed`
pub fn summarize(metrics: &[RunMetric], elapsed: Duration) -> RunSummary {
    let success_count = metrics.iter().filter(|m| m.succeeded).count();
    let failure_count = metrics.len() - success_count;

    let (mean_cpu_load, mean_memory_load) = if metrics.is_empty() {
        (0.0, 0.0)
    } else {
        let n = metrics.len() as f64;
        (
            metrics.iter().map(|m| m.cpu_load).sum::<f64>() / n,
            metrics.iter().map(|m| m.memory_load).sum::<f64>() / n,
        )
    };

    RunSummary {
        total_elapsed_ms: elapsed.as_millis() as u64,
        mean_cpu_load,
        mean_memory_load,
        success_count,
        failure_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(cpu: f64, mem: f64, exit: i32) -> RunMetric {
        RunMetric::from_exit(Some(exit), cpu, mem, 0, 1)
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[], Duration::ZERO);
        assert!(!summary.has_data());
        assert_eq!(summary.mean_cpu_load, 0.0);
        assert_eq!(summary.mean_memory_load, 0.0);
        assert_eq!(summary.run_count(), 0);
    }

    #[test]
    fn test_summarize_means_and_counts() {
        let metrics = vec![metric(10.0, 40.0, 0), metric(30.0, 60.0, 0), metric(50.0, 80.0, 7)];
        let summary = summarize(&metrics, Duration::from_millis(1234));

        assert!(summary.has_data());
        assert_eq!(summary.total_elapsed_ms, 1234);
        assert!((summary.mean_cpu_load - 30.0).abs() < 1e-9);
        assert!((summary.mean_memory_load - 60.0).abs() < 1e-9);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
    }

    #[test]
    fn test_merge_matches_flat_summary() {
        let first = vec![metric(10.0, 20.0, 0)];
        let second = vec![metric(40.0, 50.0, 0), metric(70.0, 80.0, 1)];

        let mut merged = summarize(&first, Duration::from_millis(100));
        merged.merge(&summarize(&second, Duration::from_millis(200)));

        let all: Vec<_> = first.iter().chain(second.iter()).cloned().collect();
        let flat = summarize(&all, Duration::from_millis(300));

        assert_eq!(merged.total_elapsed_ms, flat.total_elapsed_ms);
        assert_eq!(merged.success_count, flat.success_count);
        assert_eq!(merged.failure_count, flat.failure_count);
        assert!((merged.mean_cpu_load - flat.mean_cpu_load).abs() < 1e-9);
        assert!((merged.mean_memory_load - flat.mean_memory_load).abs() < 1e-9);
    }

    #[test]
    fn test_merge_with_empty() {
        let mut summary = RunSummary::default();
        summary.merge(&RunSummary::default());
        assert!(!summary.has_data());
        assert_eq!(summary.mean_cpu_load, 0.0);
    }
}
