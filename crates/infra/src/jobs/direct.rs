//! In-process backend for local development and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use featctl_core::{Job, JobStatus, Runner};

use super::manager::{JobManager, JobManagerError};

/// Tracks runs in a process-local table instead of a remote service.
///
/// Runs start `RUNNING` immediately and stay there until aborted or until a test
/// (or operator tooling) moves them with [`DirectJobManager::set_run_status`].
#[derive(Debug, Default)]
pub struct DirectJobManager {
    runs: RwLock<HashMap<String, JobStatus>>,
}

impl DirectJobManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a run into a status (simulates the backend moving on its own).
    pub fn set_run_status(&self, ext_id: &str, status: JobStatus) -> bool {
        match self.runs.write() {
            Ok(mut runs) => match runs.get_mut(ext_id) {
                Some(current) => {
                    *current = status;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn run_count(&self) -> usize {
        self.runs.read().map(|runs| runs.len()).unwrap_or(0)
    }
}

impl JobManager for DirectJobManager {
    fn runner_type(&self) -> Runner {
        Runner::Direct
    }

    fn start_job(&self, job: &Job) -> Result<Job, JobManagerError> {
        let ext_id = format!("direct-{}", Uuid::now_v7().simple());
        self.runs
            .write()
            .map_err(|_| JobManagerError::Unavailable("run table lock poisoned".to_string()))?
            .insert(ext_id.clone(), JobStatus::Running);

        info!(
            job_id = %job.id,
            ext_id = %ext_id,
            feature_sets = job.feature_sets.len(),
            "started direct run"
        );

        let mut started = job.clone();
        started.ext_id = ext_id;
        started.status = JobStatus::Running;
        started.updated_at = Utc::now();
        Ok(started)
    }

    fn abort_job(&self, ext_id: &str) -> Result<(), JobManagerError> {
        if ext_id.is_empty() {
            return Ok(());
        }
        if !self.set_run_status(ext_id, JobStatus::Aborted) {
            warn!(ext_id, "abort requested for unknown direct run");
        }
        Ok(())
    }

    fn get_job_status(&self, job: &Job) -> JobStatus {
        self.runs
            .read()
            .ok()
            .and_then(|runs| runs.get(&job.ext_id).copied())
            .unwrap_or(JobStatus::Unknown)
    }
}
