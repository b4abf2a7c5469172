//! Runner configuration
//!
//! Defines every tunable of a benchmark run: where jobs and the worker come
//! from, how wide runs may go, how long the whole run may take, and what
//! happens to in-flight work when something goes wrong.
//!
//! The configuration is built once in `main` and threaded explicitly into
//! the scheduler and executor; nothing reads it from global state.

use churn_core::domain::batch::global_concurrency_cap;
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// Smallest allowed gap between two resource samples
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// What happens to running workers when the run deadline fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DeadlinePolicy {
    /// Kill in-flight workers and return immediately
    #[default]
    Terminate,

    /// Stop waiting on in-flight workers and leave them running
    Detach,

    /// Let in-flight workers finish naturally; only new batches are blocked
    Drain,
}

/// What happens to the run when a worker cannot be executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FailurePolicy {
    /// Abort the whole run and discard its results
    #[default]
    Abort,

    /// Mark the job as failed and continue with the next one
    Isolate,
}

/// Where worker stdout/stderr go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum WorkerOutput {
    /// Share the runner's stdout/stderr
    Inherit,

    /// Discard worker output
    #[default]
    Null,
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the JSON job list
    pub jobs_file: PathBuf,

    /// Worker executable launched for every repetition
    pub worker_path: PathBuf,

    /// Configured global concurrency cap; zero or negative clamps to 1
    pub global_threads: i64,

    /// Deadline for the whole run
    pub timeout: Duration,

    /// Gap between resource samples while a worker runs
    pub sample_interval: Duration,

    pub deadline_policy: DeadlinePolicy,

    pub failure_policy: FailurePolicy,

    pub worker_output: WorkerOutput,

    /// Optional path the JSON run report is written to
    pub report_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(jobs_file: PathBuf, worker_path: PathBuf) -> Self {
        Self {
            jobs_file,
            worker_path,
            global_threads: available_parallelism() as i64,
            timeout: Duration::from_secs(20 * 60),
            sample_interval: Duration::from_millis(100),
            deadline_policy: DeadlinePolicy::default(),
            failure_policy: FailurePolicy::default(),
            worker_output: WorkerOutput::default(),
            report_path: None,
        }
    }

    /// Global concurrency cap after clamping to the machine's parallelism
    pub fn global_cap(&self) -> usize {
        global_concurrency_cap(self.global_threads, available_parallelism())
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jobs_file.as_os_str().is_empty() {
            anyhow::bail!("jobs_file cannot be empty");
        }

        if self.worker_path.as_os_str().is_empty() {
            anyhow::bail!("worker_path cannot be empty");
        }

        if self.timeout.is_zero() {
            anyhow::bail!("timeout must be greater than 0");
        }

        if self.sample_interval < MIN_SAMPLE_INTERVAL {
            anyhow::bail!(
                "sample_interval must be at least {}ms",
                MIN_SAMPLE_INTERVAL.as_millis()
            );
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("projects.json"), default_worker_path())
    }
}

/// Number of hardware threads, or 1 when it cannot be determined
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// `churn-worker` next to the running executable, or bare on `PATH`
pub fn default_worker_path() -> PathBuf {
    let name = format!("churn-worker{}", std::env::consts::EXE_SUFFIX);

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .unwrap_or_else(|| PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timeout, Duration::from_secs(1200));
        assert_eq!(config.sample_interval, Duration::from_millis(100));
        assert_eq!(config.deadline_policy, DeadlinePolicy::Terminate);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert!(config.report_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.jobs_file = PathBuf::new();
        assert!(config.validate().is_err());
        config.jobs_file = PathBuf::from("jobs.json");

        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.timeout = Duration::from_secs(1);

        config.sample_interval = Duration::from_millis(1);
        assert!(config.validate().is_err());
        config.sample_interval = MIN_SAMPLE_INTERVAL;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_global_cap_never_zero() {
        let mut config = Config::default();

        config.global_threads = 0;
        assert_eq!(config.global_cap(), 1);

        config.global_threads = -5;
        assert_eq!(config.global_cap(), 1);

        config.global_threads = i64::MAX;
        assert_eq!(config.global_cap(), available_parallelism());
    }
}
