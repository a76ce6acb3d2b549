//! Operator-facing job operations: listing, inspection, restart and abort.

use std::sync::Arc;

use tracing::info;

use featctl_core::{Job, JobId, JobStatus};

use super::coordinator::PassLock;
use super::manager::{JobManager, JobManagerError, JobManagerRegistry};
use super::store::{JobFilter, JobRepository, RepositoryError};
use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {id} is {status}; cannot {action}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        action: &'static str,
    },

    #[error(transparent)]
    Backend(#[from] JobManagerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("job pass lock poisoned")]
    LockPoisoned,
}

#[derive(Clone)]
pub struct JobService {
    repository: Arc<dyn JobRepository>,
    managers: JobManagerRegistry,
    pass_lock: PassLock,
}

impl std::fmt::Debug for JobService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobService")
            .field("managers", &self.managers)
            .finish_non_exhaustive()
    }
}

impl JobService {
    pub fn new(repository: Arc<dyn JobRepository>, managers: JobManagerRegistry) -> Self {
        Self {
            repository,
            managers,
            pass_lock: PassLock::new(),
        }
    }

    /// Share the lock of the coordinator driving the same repository.
    pub fn with_pass_lock(mut self, pass_lock: PassLock) -> Self {
        self.pass_lock = pass_lock;
        self
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, JobServiceError> {
        Ok(self.repository.list(filter)?)
    }

    pub fn get_job(&self, id: &JobId) -> Result<Job, JobServiceError> {
        self.repository
            .find_by_id(id)?
            .ok_or_else(|| JobServiceError::NotFound(id.clone()))
    }

    /// Abort and relaunch a settled, non-terminal job.
    pub fn restart_job(&self, id: &JobId) -> Result<Job, JobServiceError> {
        let _pass = self.pass_lock.acquire().ok_or(JobServiceError::LockPoisoned)?;
        let job = self.get_job(id)?;
        if job.status.is_terminal() || job.status.is_transitional() {
            return Err(JobServiceError::InvalidState {
                id: job.id,
                status: job.status,
                action: "restart",
            });
        }

        let restarted = self.manager_for(&job)?.restart_job(&job)?;
        self.repository.save_all(std::slice::from_ref(&restarted))?;
        info!(job_id = %restarted.id, ext_id = %restarted.ext_id, "job restarted");
        Ok(restarted)
    }

    /// Ask the backend to abort the job and mark it `ABORTING`; the coordinator
    /// picks up the final status. Terminal jobs are returned unchanged.
    pub fn abort_job(&self, id: &JobId) -> Result<Job, JobServiceError> {
        let _pass = self.pass_lock.acquire().ok_or(JobServiceError::LockPoisoned)?;
        let mut job = self.get_job(id)?;
        if job.status.is_terminal() {
            return Ok(job);
        }

        self.manager_for(&job)?.abort_job(&job.ext_id)?;
        job.transition(JobStatus::Aborting)
            .map_err(|_| JobServiceError::InvalidState {
                id: job.id.clone(),
                status: job.status,
                action: "abort",
            })?;
        self.repository.save_all(std::slice::from_ref(&job))?;
        info!(job_id = %job.id, ext_id = %job.ext_id, "job abort requested");
        Ok(job)
    }

    fn manager_for(&self, job: &Job) -> Result<Arc<dyn JobManager>, ConfigError> {
        self.managers.get(job.runner).ok_or_else(|| ConfigError::MissingJobManager {
            runner: job.runner,
            store: job.store.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::noop::NoOpJobManager;
    use crate::jobs::store::InMemoryJobRepository;
    use crate::jobs::testing::{Call, RecordingJobManager};
    use featctl_core::{Runner, Source, Store, StoreConfig};

    fn setup() -> (JobService, Arc<InMemoryJobRepository>, Arc<RecordingJobManager>) {
        let repository = InMemoryJobRepository::arc();
        let manager = Arc::new(RecordingJobManager::new(Runner::Direct));
        let managers = JobManagerRegistry::new(Runner::Direct)
            .register(manager.clone())
            .register(Arc::new(NoOpJobManager));
        (JobService::new(repository.clone(), managers), repository, manager)
    }

    fn job(status: JobStatus) -> Job {
        let store = Store::new(
            "online",
            StoreConfig::Redis {
                host: "localhost".to_string(),
                port: 6379,
            },
        );
        let mut job = Job::new(Runner::Direct, Source::kafka("kafka:9092", "t"), store);
        job.ext_id = "run-1".to_string();
        job.status = status;
        job
    }

    #[test]
    fn missing_jobs_are_not_found() {
        let (service, _, _) = setup();
        let err = service.get_job(&"nope".parse().unwrap()).unwrap_err();
        assert!(matches!(err, JobServiceError::NotFound(_)));
    }

    #[test]
    fn restart_relaunches_running_jobs() {
        let (service, repository, manager) = setup();
        let running = job(JobStatus::Running);
        repository.insert(running.clone()).unwrap();

        let restarted = service.restart_job(&running.id).unwrap();

        assert_eq!(restarted.id, running.id);
        assert_ne!(restarted.ext_id, running.ext_id);
        assert_eq!(
            manager.calls(),
            vec![Call::Abort("run-1".to_string()), Call::Start(running.id.clone())]
        );
        assert_eq!(service.get_job(&running.id).unwrap().ext_id, restarted.ext_id);
    }

    #[test]
    fn restart_refuses_terminal_and_transitional_jobs() {
        let (service, repository, manager) = setup();
        for status in [JobStatus::Completed, JobStatus::Pending, JobStatus::Aborting] {
            let job = job(status);
            repository.insert(job.clone()).unwrap();

            let err = service.restart_job(&job.id).unwrap_err();
            assert!(matches!(err, JobServiceError::InvalidState { .. }));
        }
        assert!(manager.calls().is_empty());
    }

    #[test]
    fn abort_marks_job_aborting() {
        let (service, repository, manager) = setup();
        let running = job(JobStatus::Running);
        repository.insert(running.clone()).unwrap();

        let aborted = service.abort_job(&running.id).unwrap();

        assert_eq!(aborted.status, JobStatus::Aborting);
        assert_eq!(manager.calls(), vec![Call::Abort("run-1".to_string())]);
        assert_eq!(service.get_job(&running.id).unwrap().status, JobStatus::Aborting);
    }

    #[test]
    fn abort_leaves_terminal_jobs_alone() {
        let (service, repository, manager) = setup();
        let done = job(JobStatus::Completed);
        repository.insert(done.clone()).unwrap();

        let unchanged = service.abort_job(&done.id).unwrap();

        assert_eq!(unchanged.status, JobStatus::Completed);
        assert!(manager.calls().is_empty());
        assert!(repository.saved_batches().unwrap().is_empty());
    }

    #[test]
    fn operator_actions_wait_for_the_pass_lock() {
        let (service, repository, manager) = setup();
        let lock = PassLock::new();
        let service = service.with_pass_lock(lock.clone());
        let running = job(JobStatus::Running);
        repository.insert(running.clone()).unwrap();

        let guard = lock.acquire().unwrap();
        let id = running.id.clone();
        let restart = std::thread::spawn(move || service.restart_job(&id));
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(manager.calls().is_empty());

        drop(guard);
        let restarted = restart.join().unwrap().unwrap();

        assert_eq!(manager.starts(), 1);
        assert_eq!(repository.find_by_id(&running.id).unwrap().unwrap().ext_id, restarted.ext_id);
    }

    #[test]
    fn list_applies_the_filter() {
        let (service, repository, _) = setup();
        repository.insert(job(JobStatus::Running)).unwrap();

        let all = service.list_jobs(&JobFilter::default()).unwrap();
        let none = service
            .list_jobs(&JobFilter {
                store: Some("elsewhere".to_string()),
                ..JobFilter::default()
            })
            .unwrap();

        assert_eq!(all.len(), 1);
        assert!(none.is_empty());
    }
}
