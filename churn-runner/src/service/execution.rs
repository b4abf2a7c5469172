//! Execution service
//!
//! Runs one worker process and observes it:
//! - Launching the worker with its positional arguments
//! - Sampling system CPU and memory load on a fixed cadence while it runs
//! - Reporting exit status and the last observed load as a [`RunMetric`]
//! - Reacting to the run deadline according to the [`DeadlinePolicy`]

use async_trait::async_trait;
use churn_core::domain::metric::RunMetric;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{Config, DeadlinePolicy, WorkerOutput};
use crate::error::ExecuteError;
use crate::service::sampler::{CpuCounters, ResourceSampler};

/// Service trait for executing a single worker run
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Executes the worker once and waits for it to exit
    ///
    /// # Arguments
    /// * `worker` - Path of the executable to launch
    /// * `args` - Positional arguments for this run
    /// * `cancel` - Fires when the run deadline expires
    ///
    /// # Returns
    /// The observed metric; a non-zero exit is reported through
    /// `RunMetric::succeeded`, not as an error
    async fn execute(
        &self,
        worker: &Path,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<RunMetric, ExecuteError>;
}

/// Settings for [`ProcessExecutionService`]
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub sample_interval: Duration,
    pub deadline_policy: DeadlinePolicy,
    pub worker_output: WorkerOutput,
}

impl From<&Config> for ExecutorSettings {
    fn from(config: &Config) -> Self {
        Self {
            sample_interval: config.sample_interval,
            deadline_policy: config.deadline_policy,
            worker_output: config.worker_output,
        }
    }
}

/// Executes workers as OS processes
pub struct ProcessExecutionService {
    settings: ExecutorSettings,
    sampler: Arc<dyn ResourceSampler>,
}

impl ProcessExecutionService {
    /// Creates a new process execution service
    pub fn new(settings: ExecutorSettings, sampler: Arc<dyn ResourceSampler>) -> Self {
        Self { settings, sampler }
    }

    fn build_command(&self, worker: &Path, args: &[String]) -> Command {
        let mut command = Command::new(worker);
        command.args(args).stdin(Stdio::null());

        match self.settings.worker_output {
            WorkerOutput::Inherit => {
                command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            WorkerOutput::Null => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        // A dropped handle must not leave a worker behind unless detaching is
        // the configured behavior.
        command.kill_on_drop(self.settings.deadline_policy != DeadlinePolicy::Detach);
        command
    }

    /// Gives up on a running worker after the deadline fired
    async fn abandon(&self, mut child: Child, worker: &Path) -> ExecuteError {
        match self.settings.deadline_policy {
            DeadlinePolicy::Terminate => {
                debug!("Deadline reached, terminating worker {}", worker.display());
                if let Err(e) = child.kill().await {
                    warn!("Failed to terminate worker {}: {}", worker.display(), e);
                }
            }
            DeadlinePolicy::Detach => {
                warn!(
                    "Deadline reached, leaving worker {} (pid {:?}) running",
                    worker.display(),
                    child.id()
                );
            }
            DeadlinePolicy::Drain => {}
        }

        ExecuteError::Cancelled
    }
}

#[async_trait]
impl ExecutionService for ProcessExecutionService {
    async fn execute(
        &self,
        worker: &Path,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<RunMetric, ExecuteError> {
        let watch_deadline = self.settings.deadline_policy != DeadlinePolicy::Drain;

        // Nothing is launched once the deadline has fired.
        if watch_deadline && cancel.is_cancelled() {
            debug!("Deadline reached, not launching worker {}", worker.display());
            return Err(ExecuteError::Cancelled);
        }

        let started = Instant::now();

        let mut child = self
            .build_command(worker, args)
            .spawn()
            .map_err(|source| ExecuteError::Launch {
                worker: worker.to_path_buf(),
                source,
            })?;

        debug!(
            "Launched worker {} (pid {:?}) with args {:?}",
            worker.display(),
            child.id(),
            args
        );

        let mut gauge = LoadGauge::new(Arc::clone(&self.sampler));
        let period = self.settings.sample_interval;
        let mut ticker = time::interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let status = loop {
            tokio::select! {
                biased;

                status = child.wait() => {
                    break status.map_err(|source| ExecuteError::Wait {
                        worker: worker.to_path_buf(),
                        source,
                    })?;
                }
                _ = cancel.cancelled(), if watch_deadline => {
                    return Err(self.abandon(child, worker).await);
                }
                _ = ticker.tick() => gauge.sample(),
            }
        };

        let metric = RunMetric::from_exit(
            status.code(),
            gauge.cpu_load,
            gauge.memory_load,
            started.elapsed().as_millis() as u64,
            gauge.samples,
        );

        if metric.succeeded {
            debug!(
                "Worker {} finished in {}ms ({} samples)",
                worker.display(),
                metric.elapsed_ms,
                metric.samples
            );
        } else {
            warn!("Worker {} ended with an error: {}", worker.display(), status);
        }

        Ok(metric)
    }
}

/// Turns periodic counter reads into the last observed load figures
struct LoadGauge {
    sampler: Arc<dyn ResourceSampler>,
    previous: Option<CpuCounters>,
    cpu_load: f64,
    memory_load: f64,
    samples: u32,
}

impl LoadGauge {
    /// Takes the CPU baseline and an initial memory reading
    fn new(sampler: Arc<dyn ResourceSampler>) -> Self {
        let previous = sampler.cpu_counters().ok();
        let memory_load = sampler.memory_load().unwrap_or(0.0);

        Self {
            sampler,
            previous,
            cpu_load: 0.0,
            memory_load,
            samples: 0,
        }
    }

    /// Reads the counters once; a failed read keeps the previous value
    fn sample(&mut self) {
        match self.sampler.cpu_counters() {
            Ok(now) => {
                if let Some(previous) = &self.previous {
                    self.cpu_load = now.load_since(previous);
                }
                self.previous = Some(now);
            }
            Err(e) => debug!("CPU sample failed: {:#}", e),
        }

        match self.sampler.memory_load() {
            Ok(load) => self.memory_load = load,
            Err(e) => debug!("Memory sample failed: {:#}", e),
        }

        self.samples += 1;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Sampler whose CPU counters advance by 100 ticks, 40 of them busy,
    /// on every read
    struct SteppingSampler {
        counters: Mutex<CpuCounters>,
    }

    impl SteppingSampler {
        fn new() -> Self {
            Self {
                counters: Mutex::new(CpuCounters::default()),
            }
        }
    }

    impl ResourceSampler for SteppingSampler {
        fn cpu_counters(&self) -> anyhow::Result<CpuCounters> {
            let mut counters = self.counters.lock().unwrap();
            counters.busy += 40;
            counters.total += 100;
            Ok(*counters)
        }

        fn memory_load(&self) -> anyhow::Result<f64> {
            Ok(42.5)
        }
    }

    struct FailingSampler;

    impl ResourceSampler for FailingSampler {
        fn cpu_counters(&self) -> anyhow::Result<CpuCounters> {
            anyhow::bail!("no counters")
        }

        fn memory_load(&self) -> anyhow::Result<f64> {
            anyhow::bail!("no meminfo")
        }
    }

    fn service(
        policy: DeadlinePolicy,
        sampler: Arc<dyn ResourceSampler>,
    ) -> ProcessExecutionService {
        ProcessExecutionService::new(
            ExecutorSettings {
                sample_interval: Duration::from_millis(20),
                deadline_policy: policy,
                worker_output: WorkerOutput::Null,
            },
            sampler,
        )
    }

    fn shell(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    #[tokio::test]
    async fn test_successful_run() {
        let service = service(DeadlinePolicy::Terminate, Arc::new(SteppingSampler::new()));
        let metric = service
            .execute(&sh(), &shell("exit 0"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(metric.succeeded);
        assert_eq!(metric.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_data() {
        let service = service(DeadlinePolicy::Terminate, Arc::new(SteppingSampler::new()));
        let metric = service
            .execute(&sh(), &shell("exit 7"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!metric.succeeded);
        assert_eq!(metric.exit_code, Some(7));
    }

    #[tokio::test]
    async fn test_samples_while_running() {
        let service = service(DeadlinePolicy::Terminate, Arc::new(SteppingSampler::new()));
        let metric = service
            .execute(&sh(), &shell("sleep 0.3"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(metric.succeeded);
        assert!(metric.samples >= 2, "only {} samples", metric.samples);
        assert!((metric.cpu_load - 40.0).abs() < 1e-9);
        assert!((metric.memory_load - 42.5).abs() < 1e-9);
        assert!(metric.elapsed_ms >= 250);
    }

    #[tokio::test]
    async fn test_sampler_failures_do_not_abort() {
        let service = service(DeadlinePolicy::Terminate, Arc::new(FailingSampler));
        let metric = service
            .execute(&sh(), &shell("sleep 0.1"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(metric.succeeded);
        assert_eq!(metric.cpu_load, 0.0);
        assert_eq!(metric.memory_load, 0.0);
    }

    #[tokio::test]
    async fn test_missing_worker_is_launch_error() {
        let service = service(DeadlinePolicy::Terminate, Arc::new(SteppingSampler::new()));
        let result = service
            .execute(
                Path::new("/nonexistent/churn-worker"),
                &[],
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(ExecuteError::Launch { .. })));
    }

    #[tokio::test]
    async fn test_terminate_on_deadline() {
        let service = service(DeadlinePolicy::Terminate, Arc::new(SteppingSampler::new()));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = service.execute(&sh(), &shell("sleep 10"), &cancel).await;

        assert!(matches!(result, Err(ExecuteError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_detach_on_deadline_returns_promptly() {
        let service = service(DeadlinePolicy::Detach, Arc::new(SteppingSampler::new()));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = service.execute(&sh(), &shell("sleep 1"), &cancel).await;

        assert!(matches!(result, Err(ExecuteError::Cancelled)));
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_expired_deadline_launches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("launched");
        let script = format!("touch {}", marker.display());

        for policy in [DeadlinePolicy::Terminate, DeadlinePolicy::Detach] {
            let service = service(policy, Arc::new(SteppingSampler::new()));
            let cancel = CancellationToken::new();
            cancel.cancel();

            let result = service.execute(&sh(), &shell(&script), &cancel).await;

            assert!(matches!(result, Err(ExecuteError::Cancelled)));
        }

        time::sleep(Duration::from_millis(100)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_drain_ignores_deadline() {
        let service = service(DeadlinePolicy::Drain, Arc::new(SteppingSampler::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let metric = service
            .execute(&sh(), &shell("sleep 0.1; exit 3"), &cancel)
            .await
            .unwrap();

        assert_eq!(metric.exit_code, Some(3));
        assert!(!metric.succeeded);
    }
}
