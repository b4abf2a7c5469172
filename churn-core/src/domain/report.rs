//! Job and run reports
//!
//! Reports are what the scheduler hands back to its caller: one
//! [`JobReport`] per job it touched and a [`RunReport`] for the whole run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::Job;
use super::metric::RunMetric;
use super::summary::RunSummary;

/// Terminal state of a single job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Every batch ran
    Completed,

    /// The run deadline fired before all batches ran
    Halted,

    /// A repetition could not be executed; remaining batches were skipped
    Failed { reason: String },
}

/// Terminal state of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Halted,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Halted => write!(f, "halted"),
            JobStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Halted => write!(f, "halted"),
        }
    }
}

/// Outcome of one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// Position of the job in the job list
    pub index: usize,

    pub job: Job,

    /// Sizes of the batches that were actually launched
    pub batches: Vec<usize>,

    /// One metric per repetition that ran to completion
    pub metrics: Vec<RunMetric>,

    pub summary: RunSummary,

    pub status: JobStatus,
}

impl JobReport {
    /// Whether this job's metrics count towards the run summary
    ///
    /// Halted jobs keep their partial metrics for inspection but are left
    /// out of the run-level fold.
    pub fn counts_towards_run(&self) -> bool {
        self.status != JobStatus::Halted
    }

    /// Total worker invocations launched for this job
    pub fn invocations(&self) -> usize {
        self.batches.iter().sum()
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub jobs: Vec<JobReport>,
    pub summary: RunSummary,
    pub status: RunStatus,
}

impl RunReport {
    /// Builds a report, folding the summaries of every counted job
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        jobs: Vec<JobReport>,
        status: RunStatus,
    ) -> Self {
        let mut summary = RunSummary::default();
        for job in jobs.iter().filter(|j| j.counts_towards_run()) {
            summary.merge(&job.summary);
        }

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            jobs,
            summary,
            status,
        }
    }

    /// An empty, completed run
    pub fn empty(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self::new(run_id, started_at, Vec::new(), RunStatus::Completed)
    }
}
