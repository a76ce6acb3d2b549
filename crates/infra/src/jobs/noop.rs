//! Backend for stores that need no streaming ingestion job.

use tracing::debug;

use featctl_core::{Job, JobStatus, Runner};

use super::manager::{JobManager, JobManagerError};

/// Accepts every call and launches nothing.
///
/// Jobs come back `RUNNING` with a synthetic external id so the coordinator treats
/// them as settled and stops re-launching them on every pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpJobManager;

impl JobManager for NoOpJobManager {
    fn runner_type(&self) -> Runner {
        Runner::NoOp
    }

    fn start_job(&self, job: &Job) -> Result<Job, JobManagerError> {
        debug!(job_id = %job.id, store = %job.store.name, "no ingestion job required");
        let mut started = job.clone();
        started.ext_id = format!("noop-{}", job.id);
        started.status = JobStatus::Running;
        started.updated_at = chrono::Utc::now();
        Ok(started)
    }

    fn abort_job(&self, _ext_id: &str) -> Result<(), JobManagerError> {
        Ok(())
    }

    fn get_job_status(&self, job: &Job) -> JobStatus {
        job.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featctl_core::{Source, Store, StoreConfig};

    #[test]
    fn start_is_inert_but_settles_the_job() {
        let job = Job::new(
            Runner::NoOp,
            Source::kafka("k:9092", "t"),
            Store::new("lake", StoreConfig::File { path: "/data".to_string() }),
        );

        let started = NoOpJobManager.start_job(&job).unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(started.status, JobStatus::Running);
        assert_eq!(started.ext_id, format!("noop-{}", job.id));
        assert_eq!(NoOpJobManager.get_job_status(&started), JobStatus::Running);
        assert!(NoOpJobManager.abort_job(&started.ext_id).is_ok());
    }
}
