//! Jobs repository
//!
//! Loads the ordered job list the scheduler works through. Jobs are read
//! once at startup and never change during a run.

use async_trait::async_trait;
use churn_core::domain::job::Job;
use churn_core::dto::JobList;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::RunError;

/// Repository trait for job-list access
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Loads and validates every job, in source order
    async fn load_jobs(&self) -> Result<Vec<Job>, RunError>;
}

/// Reads jobs from a JSON file on disk
pub struct FileJobRepository {
    path: PathBuf,
}

impl FileJobRepository {
    /// Creates a new file job repository
    ///
    /// # Arguments
    /// * `path` - Job file; relative paths are looked up in the current
    ///   directory first, then next to the running executable
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Resolves the job file path
    pub fn resolve(&self) -> PathBuf {
        if self.path.is_absolute() || self.path.exists() {
            return self.path.clone();
        }

        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&self.path)))
            .filter(|candidate| candidate.exists())
            .unwrap_or_else(|| self.path.clone())
    }

    fn source_error(path: &Path, reason: impl Into<String>) -> RunError {
        RunError::SourceLoad {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl JobRepository for FileJobRepository {
    async fn load_jobs(&self) -> Result<Vec<Job>, RunError> {
        let path = self.resolve();
        debug!("Reading jobs from {}", path.display());

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Self::source_error(&path, e.to_string()))?;

        let list: JobList = serde_json::from_str(&content)
            .map_err(|e| Self::source_error(&path, format!("invalid job file: {}", e)))?;

        let jobs = list.into_jobs();
        for (index, job) in jobs.iter().enumerate() {
            job.validate()
                .map_err(|e| Self::source_error(&path, format!("job {}: {}", index, e)))?;
        }

        info!("Loaded {} job(s) from {}", jobs.len(), path.display());
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_jobs(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.json");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_load_jobs_in_order() {
        let (_dir, path) = write_jobs(
            r#"{"projects": [
                {"memoryCount": 64, "appTimeout": 1500.0, "tryCount": 5, "maxThreads": 2},
                {"memoryCount": 128, "appTimeout": 200, "tryCount": 1, "maxThreads": 4}
            ]}"#,
        );

        let jobs = FileJobRepository::new(path).load_jobs().await.unwrap();

        assert_eq!(jobs, vec![Job::new(64, 1500.0, 5, 2), Job::new(128, 200.0, 1, 4)]);
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let (_dir, path) = write_jobs(r#"{"projects": []}"#);
        let jobs = FileJobRepository::new(path).load_jobs().await.unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let repository = FileJobRepository::new(PathBuf::from("/nonexistent/projects.json"));
        let err = repository.load_jobs().await.unwrap_err();
        assert!(matches!(err, RunError::SourceLoad { .. }));
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let (_dir, path) = write_jobs(r#"{"projects": [{"memoryCount": 1"#);
        let err = FileJobRepository::new(path).load_jobs().await.unwrap_err();
        assert!(matches!(err, RunError::SourceLoad { .. }));
    }

    #[tokio::test]
    async fn test_missing_required_field() {
        let (_dir, path) =
            write_jobs(r#"{"projects": [{"memoryCount": 1, "appTimeout": 10, "tryCount": 1}]}"#);
        let err = FileJobRepository::new(path).load_jobs().await.unwrap_err();
        assert!(matches!(err, RunError::SourceLoad { .. }));
    }

    #[tokio::test]
    async fn test_zero_max_threads_rejected() {
        let (_dir, path) = write_jobs(
            r#"{"projects": [{"memoryCount": 1, "appTimeout": 10, "tryCount": 1, "maxThreads": 0}]}"#,
        );
        let err = FileJobRepository::new(path).load_jobs().await.unwrap_err();
        match err {
            RunError::SourceLoad { reason, .. } => assert!(reason.contains("job 0")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
