//! Churn Runner
//!
//! A benchmark harness that launches a worker executable many times, caps
//! how many copies run at once, and samples system load while they run.
//!
//! Architecture:
//! - Configuration: command-line flags with environment fallbacks
//! - Repositories: job list loading
//! - Services: worker execution and resource sampling
//! - Scheduler: batch partitioning, run deadline and aggregation
//!
//! Jobs run one after another; each job's repetitions run in batches that
//! are joined before the next batch starts. A single deadline bounds the
//! whole run.

mod config;
mod error;
mod report;
mod repository;
mod scheduler;
mod service;

use anyhow::Result;
use chrono::Utc;
use churn_core::domain::job::Job;
use churn_core::domain::report::{RunReport, RunStatus};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::{Config, DeadlinePolicy, FailurePolicy, WorkerOutput, default_worker_path};
use crate::error::RunError;
use crate::repository::{FileJobRepository, JobRepository};
use crate::scheduler::{BatchScheduler, Deadline, SchedulerSettings};
use crate::service::{ExecutionService, ExecutorSettings, ProcessExecutionService, default_sampler};

#[derive(Parser)]
#[command(name = "churn")]
#[command(about = "Concurrency-throttled worker benchmark harness", long_about = None)]
struct Cli {
    /// JSON file listing the jobs to run
    #[arg(long = "jobs", env = "CHURN_JOBS_FILE", default_value = "projects.json")]
    jobs_file: PathBuf,

    /// Worker executable [default: churn-worker next to this binary]
    #[arg(long, env = "CHURN_WORKER")]
    worker: Option<PathBuf>,

    /// Global concurrency cap [default: available parallelism]
    #[arg(long, env = "CHURN_GLOBAL_THREADS", allow_negative_numbers = true)]
    threads: Option<i64>,

    /// Deadline for the whole run, in minutes
    #[arg(long, env = "CHURN_TIMEOUT_MINUTES", default_value_t = 20)]
    timeout_minutes: u64,

    /// Gap between resource samples, in milliseconds
    #[arg(long, env = "CHURN_SAMPLE_INTERVAL_MS", default_value_t = 100)]
    sample_interval_ms: u64,

    /// What to do with running workers when the deadline fires
    #[arg(long, env = "CHURN_ON_DEADLINE", value_enum, default_value_t = DeadlinePolicy::Terminate)]
    on_deadline: DeadlinePolicy,

    /// What to do with the run when a worker cannot be executed
    #[arg(long, env = "CHURN_ON_FAILURE", value_enum, default_value_t = FailurePolicy::Abort)]
    on_failure: FailurePolicy,

    /// Where worker stdout/stderr go
    #[arg(long, env = "CHURN_WORKER_OUTPUT", value_enum, default_value_t = WorkerOutput::Null)]
    worker_output: WorkerOutput,

    /// Write the run report as JSON to this path
    #[arg(long, env = "CHURN_REPORT")]
    report: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::new(
            self.jobs_file,
            self.worker.unwrap_or_else(default_worker_path),
        );

        if let Some(threads) = self.threads {
            config.global_threads = threads;
        }
        config.timeout = Duration::from_secs(self.timeout_minutes.saturating_mul(60));
        config.sample_interval = Duration::from_millis(self.sample_interval_ms);
        config.deadline_policy = self.on_deadline;
        config.failure_policy = self.on_failure;
        config.worker_output = self.worker_output;
        config.report_path = self.report;
        config
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churn_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Churn runner");

    let config = Cli::parse().into_config();
    config.validate()?;
    info!(
        "Loaded configuration: jobs_file={}, worker={}, global_cap={}, timeout={:?}",
        config.jobs_file.display(),
        config.worker_path.display(),
        config.global_cap(),
        config.timeout
    );
    info!(
        "Sample interval: {:?}, on deadline: {:?}, on failure: {:?}",
        config.sample_interval, config.deadline_policy, config.failure_policy
    );

    let repository = FileJobRepository::new(config.jobs_file.clone());

    let executor: Arc<dyn ExecutionService> = Arc::new(ProcessExecutionService::new(
        ExecutorSettings::from(&config),
        default_sampler(),
    ));
    let scheduler = BatchScheduler::new(SchedulerSettings::from(&config), executor);

    // The deadline covers job loading as well as execution.
    let deadline = Deadline::after(config.timeout);

    let result = match load_jobs(&repository, &deadline).await {
        Ok(jobs) => scheduler.run(&jobs, &deadline).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(report) => {
            report::log_run_report(&report);
            if let Some(path) = &config.report_path {
                report::write_report(path, &report).await?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("An error occurred while running the benchmark: {}", e);

            if e.is_deadline() {
                warn!("Run halted by deadline, reporting partial results");
            }

            if let Some(partial) = e.partial_report() {
                report::log_run_report(partial);
                if let Some(path) = &config.report_path {
                    report::write_report(path, partial).await?;
                }
            }

            Ok(ExitCode::FAILURE)
        }
    }
}

/// Loads the job list, giving up when the run deadline fires first
async fn load_jobs(
    repository: &dyn JobRepository,
    deadline: &Deadline,
) -> Result<Vec<Job>, RunError> {
    tokio::select! {
        jobs = repository.load_jobs() => jobs,
        _ = deadline.token().cancelled() => {
            warn!("Deadline reached while loading jobs");
            let report =
                RunReport::new(Uuid::new_v4(), Utc::now(), Vec::new(), RunStatus::Halted);
            Err(RunError::DeadlineExceeded {
                report: Box::new(report),
            })
        }
    }
}
