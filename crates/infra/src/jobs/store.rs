//! Job repository.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use featctl_core::{FeatureSetRef, Job, JobId, Source, Store};

/// Persistence of ingestion jobs.
pub trait JobRepository: Send + Sync {
    /// Non-terminal jobs bound to this exact (store, source) pair, compared by value.
    fn find_active_jobs_by_store_and_source(&self, store: &Store, source: &Source) -> Result<Vec<Job>, RepositoryError>;

    /// Insert or replace every job in one batch.
    fn save_all(&self, jobs: &[Job]) -> Result<(), RepositoryError>;

    fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;

    /// Jobs matching `filter`, oldest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job listing filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    /// Store name.
    pub store: Option<String>,
    pub feature_set: Option<FeatureSetRef>,
}

impl JobFilter {
    pub fn accepts(&self, job: &Job) -> bool {
        self.store.as_ref().is_none_or(|name| &job.store.name == name)
            && self
                .feature_set
                .as_ref()
                .is_none_or(|reference| job.feature_sets.contains_key(reference))
    }
}

/// In-memory repository for tests/dev.
///
/// Every `save_all` batch is recorded, so tests can assert on what a pass wrote.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<JobId, Job>>,
    batches: RwLock<Vec<Vec<Job>>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed jobs without recording a batch.
    pub fn insert(&self, job: Job) -> Result<(), RepositoryError> {
        self.jobs.write().map_err(poisoned)?.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn saved_batches(&self) -> Result<Vec<Vec<Job>>, RepositoryError> {
        Ok(self.batches.read().map_err(poisoned)?.clone())
    }

    pub fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.jobs.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.len()? == 0)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> RepositoryError {
    RepositoryError::Storage("job repository lock poisoned".to_string())
}

impl JobRepository for InMemoryJobRepository {
    fn find_active_jobs_by_store_and_source(&self, store: &Store, source: &Source) -> Result<Vec<Job>, RepositoryError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        let mut found: Vec<_> = jobs
            .values()
            .filter(|j| j.is_active() && j.store == *store && j.source == *source)
            .cloned()
            .collect();

        // Most recent first: that one is the job the engine keeps converging.
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(found)
    }

    fn save_all(&self, batch: &[Job]) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        for job in batch {
            jobs.insert(job.id.clone(), job.clone());
        }
        self.batches.write().map_err(poisoned)?.push(batch.to_vec());
        Ok(())
    }

    fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.jobs.read().map_err(poisoned)?.get(id).cloned())
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, RepositoryError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        let mut result: Vec<_> = jobs.values().filter(|j| filter.accepts(j)).cloned().collect();

        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(result)
    }
}

impl JobRepository for Arc<InMemoryJobRepository> {
    fn find_active_jobs_by_store_and_source(&self, store: &Store, source: &Source) -> Result<Vec<Job>, RepositoryError> {
        (**self).find_active_jobs_by_store_and_source(store, source)
    }

    fn save_all(&self, jobs: &[Job]) -> Result<(), RepositoryError> {
        (**self).save_all(jobs)
    }

    fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        (**self).find_by_id(id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, RepositoryError> {
        (**self).list(filter)
    }
}
