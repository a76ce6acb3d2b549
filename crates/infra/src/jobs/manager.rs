//! Backend capability interface and the per-runner registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use featctl_core::{Job, JobStatus, Runner, Store};

use crate::config::ConfigError;

/// Error raised by a job manager when launching or controlling a job.
#[derive(Debug, thiserror::Error)]
pub enum JobManagerError {
    /// The backend answered with a non-success status.
    #[error("unable to run job {job_id}: backend returned {status}: {message}")]
    JobExecution {
        job_id: String,
        status: u16,
        message: String,
    },

    /// The backend could not be reached (or its answer could not be read).
    #[error("transport error for job {job_id}: {source}")]
    Transport {
        job_id: String,
        #[source]
        source: TransportError,
    },

    /// The run reached a terminal status before it was ever running.
    #[error("job {job_id} failed to start: backend reported {status}")]
    StartupFailed { job_id: String, status: JobStatus },

    /// The run did not reach RUNNING within the configured deadline.
    #[error("job {job_id} did not start running within {waited:?}")]
    StartupTimeout { job_id: String, waited: Duration },

    /// The backend cannot take calls right now.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The job's store/source/feature-set specs cannot be handed to the backend.
    #[error("job {job_id} has an invalid spec: {message}")]
    InvalidSpec { job_id: String, message: String },
}

/// Transport-level failure talking to a backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Capability set every execution backend provides.
///
/// Calls never mutate the job they are given; launched or updated jobs are
/// returned as new values.
pub trait JobManager: Send + Sync {
    /// Which backend this manager drives.
    fn runner_type(&self) -> Runner;

    /// Launch a job and return it with `ext_id` set and its status advanced.
    fn start_job(&self, job: &Job) -> Result<Job, JobManagerError>;

    /// Backends cannot update in place, so an update is a restart. The source is
    /// unserved between the abort and the new run.
    fn update_job(&self, job: &Job) -> Result<Job, JobManagerError> {
        self.restart_job(job)
    }

    /// Abort the current run (best effort), then start the job again.
    fn restart_job(&self, job: &Job) -> Result<Job, JobManagerError> {
        if let Err(err) = self.abort_job(&job.ext_id) {
            warn!(
                job_id = %job.id,
                ext_id = %job.ext_id,
                runner = %self.runner_type(),
                error = %err,
                "abort before restart failed; starting anyway"
            );
        }
        self.start_job(job)
    }

    /// Best-effort cancellation of a backend run. An empty id is a no-op.
    fn abort_job(&self, ext_id: &str) -> Result<(), JobManagerError>;

    /// Current backend status. Never fails: unreachable backends yield `UNKNOWN`.
    fn get_job_status(&self, job: &Job) -> JobStatus;
}

/// Job managers keyed by runner, plus the policy choosing a runner per store.
#[derive(Clone)]
pub struct JobManagerRegistry {
    managers: HashMap<Runner, Arc<dyn JobManager>>,
    streaming_runner: Runner,
}

impl std::fmt::Debug for JobManagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut runners: Vec<_> = self.managers.keys().map(Runner::name).collect();
        runners.sort_unstable();
        f.debug_struct("JobManagerRegistry")
            .field("runners", &runners)
            .field("streaming_runner", &self.streaming_runner)
            .finish()
    }
}

impl JobManagerRegistry {
    /// `streaming_runner` serves every store that needs a streaming ingestion job.
    pub fn new(streaming_runner: Runner) -> Self {
        Self {
            managers: HashMap::new(),
            streaming_runner,
        }
    }

    /// Register a manager under its own runner type (replacing any previous one).
    pub fn register(mut self, manager: Arc<dyn JobManager>) -> Self {
        self.managers.insert(manager.runner_type(), manager);
        self
    }

    pub fn streaming_runner(&self) -> Runner {
        self.streaming_runner
    }

    pub fn get(&self, runner: Runner) -> Option<Arc<dyn JobManager>> {
        self.managers.get(&runner).cloned()
    }

    /// Runner a store's jobs must use.
    pub fn runner_for_store(&self, store: &Store) -> Runner {
        if store.store_type().requires_streaming_ingestion() {
            self.streaming_runner
        } else {
            Runner::NoOp
        }
    }

    pub fn manager_for_store(&self, store: &Store) -> Result<Arc<dyn JobManager>, ConfigError> {
        let runner = self.runner_for_store(store);
        self.get(runner).ok_or(ConfigError::MissingJobManager {
            runner,
            store: store.name.clone(),
        })
    }

    /// Both the streaming runner and the no-op runner must be registered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for runner in [self.streaming_runner, Runner::NoOp] {
            if !self.managers.contains_key(&runner) {
                return Err(ConfigError::UnsupportedRunner(runner.name().to_string()));
            }
        }
        Ok(())
    }
}
