//! Batch scheduler
//!
//! Runs jobs strictly one after another. Within a job, repetitions run in
//! consecutive batches no wider than the effective concurrency; every
//! member of a batch is joined before the next batch starts, and metrics
//! are folded only after the join, on the scheduler's own task.

use chrono::Utc;
use churn_core::domain::batch::{effective_concurrency, partition};
use churn_core::domain::job::Job;
use churn_core::domain::metric::RunMetric;
use churn_core::domain::report::{JobReport, JobStatus, RunReport, RunStatus};
use churn_core::domain::summary::summarize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, FailurePolicy};
use crate::error::{ExecuteError, RunError};
use crate::scheduler::deadline::Deadline;
use crate::service::ExecutionService;

/// Immutable run context for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Worker executable launched for every repetition
    pub worker: PathBuf,

    /// Global concurrency cap, already clamped to at least 1
    pub global_cap: usize,

    pub failure_policy: FailurePolicy,
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        Self {
            worker: config.worker_path.clone(),
            global_cap: config.global_cap(),
            failure_policy: config.failure_policy,
        }
    }
}

/// How a single repetition ended
enum Outcome {
    Finished(RunMetric),
    Cancelled,
    Failed(RunError),
}

/// Drives jobs through the execution service in bounded batches
pub struct BatchScheduler {
    settings: SchedulerSettings,
    executor: Arc<dyn ExecutionService>,
}

impl BatchScheduler {
    /// Creates a new batch scheduler
    pub fn new(settings: SchedulerSettings, executor: Arc<dyn ExecutionService>) -> Self {
        Self { settings, executor }
    }

    /// Runs every job in order under the given deadline
    ///
    /// # Returns
    /// The run report when every job ran. When the deadline fires first,
    /// `RunError::DeadlineExceeded` carries the partial report.
    pub async fn run(&self, jobs: &[Job], deadline: &Deadline) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            "Starting run {} with {} job(s), global concurrency cap {}",
            run_id,
            jobs.len(),
            self.settings.global_cap
        );

        let mut reports = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.iter().enumerate() {
            if deadline.is_expired() {
                warn!(
                    "Deadline reached before job {}, skipping {} remaining job(s)",
                    index,
                    jobs.len() - index
                );
                return Err(halt(run_id, started_at, reports));
            }

            info!("Processing job {}: {}", index, job);
            debug!("{:?} left before the run deadline", deadline.remaining());

            let report = self.run_job(index, job, deadline).await?;
            let halted = report.status == JobStatus::Halted;
            reports.push(report);

            if halted {
                return Err(halt(run_id, started_at, reports));
            }
        }

        let report = RunReport::new(run_id, started_at, reports, RunStatus::Completed);
        info!("Run {} completed", run_id);
        Ok(report)
    }

    /// Runs all batches of one job
    async fn run_job(
        &self,
        index: usize,
        job: &Job,
        deadline: &Deadline,
    ) -> Result<JobReport, RunError> {
        let width = effective_concurrency(job.max_concurrency, self.settings.global_cap);
        let planned = partition(job.repetitions, width);
        let args = job.worker_args();

        debug!(
            "Job {}: {} repetition(s) in {} batch(es) of up to {}",
            index,
            job.repetitions,
            planned.len(),
            width
        );

        let mut launched = Vec::with_capacity(planned.len());
        let mut metrics = Vec::with_capacity(job.repetitions as usize);
        let mut status = JobStatus::Completed;
        let started = Instant::now();

        for (batch, &size) in planned.iter().enumerate() {
            if deadline.is_expired() {
                warn!(
                    "Job {}: deadline reached, {} batch(es) not started",
                    index,
                    planned.len() - batch
                );
                status = JobStatus::Halted;
                break;
            }

            debug!(
                "Job {}: batch {}/{} with {} repetition(s)",
                index,
                batch + 1,
                planned.len(),
                size
            );

            launched.push(size);
            let outcomes = self
                .run_batch(index, size, &args, deadline.token())
                .await;

            let mut cancelled = false;
            let mut failure = None;
            for outcome in outcomes {
                match outcome {
                    Outcome::Finished(metric) => metrics.push(metric),
                    Outcome::Cancelled => cancelled = true,
                    Outcome::Failed(err) => {
                        failure.get_or_insert(err);
                    }
                }
            }

            if let Some(err) = failure {
                match self.settings.failure_policy {
                    FailurePolicy::Abort => {
                        error!("Job {} failed, aborting run: {}", index, err);
                        return Err(err);
                    }
                    FailurePolicy::Isolate => {
                        error!(
                            "Job {} failed, skipping its remaining batches: {}",
                            index, err
                        );
                        status = JobStatus::Failed {
                            reason: err.to_string(),
                        };
                        break;
                    }
                }
            }

            if cancelled {
                status = JobStatus::Halted;
                break;
            }
        }

        let elapsed = started.elapsed();
        let summary = summarize(&metrics, elapsed);

        info!(
            "Job {} {}: {} run(s), {} failure(s) in {}ms",
            index,
            status,
            summary.run_count(),
            summary.failure_count,
            summary.total_elapsed_ms
        );

        Ok(JobReport {
            index,
            job: job.clone(),
            batches: launched,
            metrics,
            summary,
            status,
        })
    }

    /// Launches `size` repetitions at once and joins all of them
    async fn run_batch(
        &self,
        index: usize,
        size: usize,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Vec<Outcome> {
        let handles: Vec<_> = (0..size)
            .map(|_| {
                let executor = Arc::clone(&self.executor);
                let worker = self.settings.worker.clone();
                let args = args.to_vec();
                let cancel = cancel.clone();

                tokio::spawn(async move { executor.execute(&worker, &args, &cancel).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(size);
        for handle in handles {
            let outcome = match handle.await {
                Ok(Ok(metric)) => Outcome::Finished(metric),
                Ok(Err(ExecuteError::Cancelled)) => Outcome::Cancelled,
                Ok(Err(err @ ExecuteError::Launch { .. })) => Outcome::Failed(RunError::Launch {
                    job: index,
                    source: err,
                }),
                Ok(Err(err)) => Outcome::Failed(RunError::Unhandled(err.to_string())),
                Err(e) => Outcome::Failed(RunError::Unhandled(format!(
                    "Repetition task panicked: {}",
                    e
                ))),
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

/// Builds the deadline error around whatever has been collected so far
fn halt(run_id: Uuid, started_at: chrono::DateTime<Utc>, reports: Vec<JobReport>) -> RunError {
    let report = RunReport::new(run_id, started_at, reports, RunStatus::Halted);
    RunError::DeadlineExceeded {
        report: Box::new(report),
    }
}
