//! Error types for the runner

use churn_core::domain::report::RunReport;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from a single worker execution
///
/// A worker that runs and exits non-zero is not an error; it is recorded as
/// a failed [`RunMetric`](churn_core::domain::metric::RunMetric).
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The worker process could not be started
    #[error("Failed to launch worker {}: {source}", .worker.display())]
    Launch {
        worker: PathBuf,
        source: std::io::Error,
    },

    /// The worker started but its exit status could not be collected
    #[error("Failed to wait for worker {}: {source}", .worker.display())]
    Wait {
        worker: PathBuf,
        source: std::io::Error,
    },

    /// The run deadline fired while the worker was running
    #[error("Worker execution cancelled by run deadline")]
    Cancelled,
}

/// Errors that end a benchmark run
#[derive(Debug, Error)]
pub enum RunError {
    /// The job list is missing or malformed; nothing was run
    #[error("Failed to load jobs from {}: {reason}", .path.display())]
    SourceLoad { path: PathBuf, reason: String },

    /// A worker could not be executed for the given job
    #[error("Job {job}: {source}")]
    Launch { job: usize, source: ExecuteError },

    /// The run deadline fired; the report holds whatever finished
    #[error("Run deadline exceeded after {} job(s)", .report.jobs.len())]
    DeadlineExceeded { report: Box<RunReport> },

    /// Anything else, such as a panicked repetition task
    #[error("Unhandled error: {0}")]
    Unhandled(String),
}

impl RunError {
    /// Partial report carried by the error, if any
    pub fn partial_report(&self) -> Option<&RunReport> {
        match self {
            RunError::DeadlineExceeded { report } => Some(&**report),
            _ => None,
        }
    }

    /// Check if this error is a deadline expiry
    pub fn is_deadline(&self) -> bool {
        matches!(self, RunError::DeadlineExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_partial_report_only_on_deadline() {
        let report = RunReport::empty(Uuid::new_v4(), Utc::now());
        let err = RunError::DeadlineExceeded {
            report: Box::new(report),
        };
        assert!(err.is_deadline());
        assert!(err.partial_report().is_some());

        let err = RunError::Unhandled("boom".to_string());
        assert!(!err.is_deadline());
        assert!(err.partial_report().is_none());
    }

    #[test]
    fn test_launch_error_message() {
        let err = RunError::Launch {
            job: 2,
            source: ExecuteError::Launch {
                worker: PathBuf::from("/missing/worker"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
        };
        let message = err.to_string();
        assert!(message.starts_with("Job 2: Failed to launch worker /missing/worker"));
    }
}
