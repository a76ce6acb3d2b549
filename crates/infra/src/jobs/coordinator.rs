//! Reconciliation engine.
//!
//! One [`JobCoordinator::poll`] computes the desired jobs from the spec registry
//! (one per store/source pair whose feature sets the store subscribes to) and
//! converges the job repository and the backends towards them:
//!
//! - no active job for the pair: create one and start it
//! - active job never accepted by a backend: start it again
//! - active job with a different composition: update it (abort, then start)
//! - active job as desired: refresh its status
//!
//! Everything created or changed is written with one `save_all` at the end of the
//! pass. Stale jobs (pairs no longer desired) are left alone.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use featctl_core::{DomainError, FeatureSetSpec, Job, JobId, JobStatus, Source, Store, SubscriptionMatcher};

use super::manager::{JobManager, JobManagerError, JobManagerRegistry};
use super::service::JobService;
use super::store::{JobRepository, RepositoryError};
use crate::config::ConfigError;
use crate::spec::{FeatureSetFilter, SpecService, SpecServiceError};

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Time between passes when run by the worker.
    pub poll_interval: Duration,
    /// Maximum backend calls in flight within a pass.
    pub max_concurrent: usize,
    /// Name for logging
    pub name: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            max_concurrent: 4,
            name: "job-coordinator".to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }
}

/// Failure of a whole pass.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("unable to list stores: {0}")]
    Spec(#[from] SpecServiceError),

    #[error("store {store} has an invalid subscription: {source}")]
    InvalidSubscription {
        store: String,
        #[source]
        source: DomainError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("reconciliation worker panicked for store {store}")]
    WorkerPanicked { store: String },

    #[error("coordinator pass lock poisoned")]
    LockPoisoned,
}

/// Serializes reconciliation passes and operator actions on jobs.
///
/// Both read jobs, call backends and write the result back; holding this lock
/// keeps one from overwriting what the other just launched.
#[derive(Debug, Clone, Default)]
pub struct PassLock(Arc<Mutex<()>>);

impl PassLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a previous holder panicked.
    pub fn acquire(&self) -> Option<MutexGuard<'_, ()>> {
        self.0.lock().ok()
    }
}

/// A (store, source) pair that should have a running job.
#[derive(Debug, Clone)]
struct DesiredJob {
    store: Store,
    source: Source,
    feature_sets: Vec<FeatureSetSpec>,
}

#[derive(Debug)]
enum Outcome {
    Started(Job),
    /// Persisted as-is so the next pass retries it.
    StartFailed { job: Job, error: JobManagerError },
    Updated(Job),
    UpdateFailed { job_id: JobId, error: JobManagerError },
    StatusChanged(Job),
    Unchanged,
}

/// Per-job failure recorded in a [`PollReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollFailure {
    pub store: String,
    pub source: String,
    pub job_id: String,
    pub error: String,
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub stores_scanned: usize,
    pub stores_skipped: usize,
    pub desired_jobs: usize,
    pub started: usize,
    pub updated: usize,
    pub status_changes: usize,
    pub unchanged: usize,
    pub failures: Vec<PollFailure>,
    pub saved: usize,
    pub duration_ms: u64,
}

pub struct JobCoordinator {
    specs: Arc<dyn SpecService>,
    repository: Arc<dyn JobRepository>,
    managers: JobManagerRegistry,
    config: CoordinatorConfig,
    pass_lock: PassLock,
}

impl std::fmt::Debug for JobCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCoordinator")
            .field("managers", &self.managers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JobCoordinator {
    /// Fails when the registry lacks the streaming or the no-op manager.
    pub fn new(
        specs: Arc<dyn SpecService>,
        repository: Arc<dyn JobRepository>,
        managers: JobManagerRegistry,
        config: CoordinatorConfig,
    ) -> Result<Self, ConfigError> {
        managers.validate()?;
        Ok(Self {
            specs,
            repository,
            managers,
            config,
            pass_lock: PassLock::new(),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Operator actions over the same jobs, serialized with the passes.
    pub fn job_service(&self) -> JobService {
        JobService::new(self.repository.clone(), self.managers.clone()).with_pass_lock(self.pass_lock.clone())
    }

    /// Run one reconciliation pass. Concurrent callers wait for each other.
    pub fn poll(&self) -> Result<PollReport, CoordinatorError> {
        let _pass = self.pass_lock.acquire().ok_or(CoordinatorError::LockPoisoned)?;
        let started = Instant::now();
        let mut report = PollReport::default();

        let stores = self.specs.list_stores()?;
        if stores.is_empty() {
            debug!(coordinator = %self.config.name, "no stores registered");
            return Ok(report);
        }

        let mut desired = Vec::new();
        for store in stores {
            report.stores_scanned += 1;
            let matcher = SubscriptionMatcher::compile(&store.subscriptions).map_err(|source| {
                CoordinatorError::InvalidSubscription {
                    store: store.name.clone(),
                    source,
                }
            })?;

            let feature_sets = match self.subscribed_feature_sets(&store, &matcher) {
                Ok(feature_sets) => feature_sets,
                Err(CoordinatorError::Spec(err)) => {
                    warn!(store = %store.name, error = %err, "feature set query failed; store skipped this pass");
                    report.stores_skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };
            if feature_sets.is_empty() {
                debug!(store = %store.name, "store subscribes to no feature sets");
                continue;
            }

            for (source, feature_sets) in group_by_source(feature_sets) {
                desired.push(DesiredJob {
                    store: store.clone(),
                    source,
                    feature_sets,
                });
            }
        }
        report.desired_jobs = desired.len();

        let outcomes = self.converge_all(&desired);

        let mut batch = Vec::new();
        let mut fatal = None;
        for (wanted, outcome) in desired.iter().zip(outcomes) {
            let failure = |job_id: &JobId, error: &JobManagerError| PollFailure {
                store: wanted.store.name.clone(),
                source: wanted.source.key(),
                job_id: job_id.to_string(),
                error: error.to_string(),
            };

            match outcome {
                Ok(Outcome::Started(job)) => {
                    report.started += 1;
                    batch.push(job);
                }
                Ok(Outcome::StartFailed { job, error }) => {
                    report.failures.push(failure(&job.id, &error));
                    batch.push(job);
                }
                Ok(Outcome::Updated(job)) => {
                    report.updated += 1;
                    batch.push(job);
                }
                Ok(Outcome::UpdateFailed { job_id, error }) => {
                    report.failures.push(failure(&job_id, &error));
                }
                Ok(Outcome::StatusChanged(job)) => {
                    report.status_changes += 1;
                    batch.push(job);
                }
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Err(err) => {
                    error!(store = %wanted.store.name, source = %wanted.source, error = %err, "reconciliation failed");
                    fatal.get_or_insert(err);
                }
            }
        }

        // Persist what the backends already did, even if the pass as a whole failed.
        if !batch.is_empty() {
            self.repository.save_all(&batch)?;
            report.saved = batch.len();
        }
        report.duration_ms = featctl_observability::millis(started.elapsed());

        if let Some(err) = fatal {
            return Err(err);
        }

        info!(
            coordinator = %self.config.name,
            desired = report.desired_jobs,
            started = report.started,
            updated = report.updated,
            status_changes = report.status_changes,
            failures = report.failures.len(),
            saved = report.saved,
            duration_ms = report.duration_ms,
            "reconciliation pass complete"
        );
        Ok(report)
    }

    /// Feature sets the store subscribes to, deduplicated by reference in query order.
    fn subscribed_feature_sets(
        &self,
        store: &Store,
        matcher: &SubscriptionMatcher,
    ) -> Result<Vec<FeatureSetSpec>, CoordinatorError> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for sub in &store.subscriptions {
            for spec in self.specs.list_feature_sets(&FeatureSetFilter::from(sub))? {
                if seen.insert(spec.reference()) {
                    candidates.push(spec);
                }
            }
        }

        candidates.retain(|spec| matcher.matches(&spec.project, &spec.name));
        Ok(candidates)
    }

    /// Converge every desired job, at most `max_concurrent` at a time. Results keep
    /// the input order.
    fn converge_all(&self, desired: &[DesiredJob]) -> Vec<Result<Outcome, CoordinatorError>> {
        let workers = self.config.max_concurrent.max(1);
        if workers == 1 || desired.len() <= 1 {
            return desired.iter().map(|d| self.converge(d)).collect();
        }

        let mut outcomes = Vec::with_capacity(desired.len());
        for chunk in desired.chunks(workers) {
            thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|d| (d, scope.spawn(move || self.converge(d))))
                    .collect();
                for (d, handle) in handles {
                    outcomes.push(handle.join().unwrap_or_else(|_| {
                        Err(CoordinatorError::WorkerPanicked {
                            store: d.store.name.clone(),
                        })
                    }));
                }
            });
        }
        outcomes
    }

    fn converge(&self, desired: &DesiredJob) -> Result<Outcome, CoordinatorError> {
        let manager = self.managers.manager_for_store(&desired.store)?;
        let existing = self
            .repository
            .find_active_jobs_by_store_and_source(&desired.store, &desired.source)?
            .into_iter()
            .next();

        let Some(job) = existing else {
            let job = Job::new(manager.runner_type(), desired.source.clone(), desired.store.clone())
                .with_feature_sets(desired.feature_sets.iter().cloned());
            return Ok(start(manager.as_ref(), job));
        };

        let mut wanted = job.clone().with_feature_sets(desired.feature_sets.iter().cloned());
        wanted.runner = manager.runner_type();

        if !job.is_launched() {
            return Ok(match job.status {
                JobStatus::Pending | JobStatus::Unknown => start(manager.as_ref(), wanted),
                // Aborted before any backend accepted it; nothing to cancel remotely.
                _ => settle_unlaunched(job),
            });
        }

        if !job.matches_input(&wanted) {
            info!(job_id = %job.id, store = %desired.store.name, "job composition changed; updating");
            return Ok(match manager.update_job(&wanted) {
                Ok(updated) => Outcome::Updated(updated),
                Err(error) => {
                    error!(job_id = %job.id, error = %error, "job update failed");
                    Outcome::UpdateFailed { job_id: job.id, error }
                }
            });
        }

        let status = manager.get_job_status(&job);
        if status == job.status {
            return Ok(Outcome::Unchanged);
        }

        let mut refreshed = job;
        match refreshed.transition(status) {
            Ok(()) => {
                debug!(job_id = %refreshed.id, status = %status, "job status changed");
                Ok(Outcome::StatusChanged(refreshed))
            }
            Err(err) => {
                warn!(job_id = %refreshed.id, error = %err, "ignoring backend status");
                Ok(Outcome::Unchanged)
            }
        }
    }
}

fn start(manager: &dyn JobManager, job: Job) -> Outcome {
    match manager.start_job(&job) {
        Ok(started) => {
            info!(job_id = %started.id, ext_id = %started.ext_id, runner = %started.runner, "job started");
            Outcome::Started(started)
        }
        Err(error) => {
            error!(job_id = %job.id, runner = %job.runner, error = %error, "job start failed; retrying next pass");
            let mut pending = job;
            pending.ext_id.clear();
            pending.status = JobStatus::Pending;
            Outcome::StartFailed { job: pending, error }
        }
    }
}

fn settle_unlaunched(mut job: Job) -> Outcome {
    match job.transition(JobStatus::Aborted) {
        Ok(()) => {
            info!(job_id = %job.id, "unlaunched job aborted");
            Outcome::StatusChanged(job)
        }
        Err(err) => {
            warn!(job_id = %job.id, error = %err, "unlaunched job left as is");
            Outcome::Unchanged
        }
    }
}

/// Group by source value, in order of first appearance.
fn group_by_source(feature_sets: Vec<FeatureSetSpec>) -> Vec<(Source, Vec<FeatureSetSpec>)> {
    let mut index: HashMap<Source, usize> = HashMap::new();
    let mut groups: Vec<(Source, Vec<FeatureSetSpec>)> = Vec::new();
    for spec in feature_sets {
        match index.get(&spec.source) {
            Some(&i) => groups[i].1.push(spec),
            None => {
                index.insert(spec.source.clone(), groups.len());
                groups.push((spec.source.clone(), vec![spec]));
            }
        }
    }
    groups
}
