use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use featctl_core::{FeatureSetSpec, Store};

use super::{FeatureSetFilter, SpecService, SpecServiceError};

#[derive(Debug)]
struct Entry<T> {
    loaded_at: Instant,
    value: T,
}

impl<T: Clone> Entry<T> {
    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.loaded_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

/// Read-through TTL cache in front of another spec service.
///
/// Errors are never cached. A zero TTL disables caching.
#[derive(Debug)]
pub struct CachingSpecService<S> {
    inner: S,
    ttl: Duration,
    stores: Mutex<Option<Entry<Vec<Store>>>>,
    feature_sets: Mutex<HashMap<FeatureSetFilter, Entry<Vec<FeatureSetSpec>>>>,
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> SpecServiceError {
    SpecServiceError::Unavailable("spec cache lock poisoned".to_string())
}

impl<S: SpecService> CachingSpecService<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            stores: Mutex::new(None),
            feature_sets: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop everything cached; the next call reads through.
    pub fn invalidate(&self) -> Result<(), SpecServiceError> {
        *self.stores.lock().map_err(poisoned)? = None;
        self.feature_sets.lock().map_err(poisoned)?.clear();
        Ok(())
    }
}

impl<S: SpecService> SpecService for CachingSpecService<S> {
    fn list_stores(&self) -> Result<Vec<Store>, SpecServiceError> {
        let mut cached = self.stores.lock().map_err(poisoned)?;
        if let Some(stores) = cached.as_ref().and_then(|e| e.fresh(self.ttl)) {
            return Ok(stores);
        }

        let stores = self.inner.list_stores()?;
        *cached = Some(Entry {
            loaded_at: Instant::now(),
            value: stores.clone(),
        });
        Ok(stores)
    }

    fn list_feature_sets(&self, filter: &FeatureSetFilter) -> Result<Vec<FeatureSetSpec>, SpecServiceError> {
        let mut cached = self.feature_sets.lock().map_err(poisoned)?;
        if let Some(specs) = cached.get(filter).and_then(|e| e.fresh(self.ttl)) {
            return Ok(specs);
        }

        let specs = self.inner.list_feature_sets(filter)?;
        cached.insert(
            filter.clone(),
            Entry {
                loaded_at: Instant::now(),
                value: specs.clone(),
            },
        );
        Ok(specs)
    }
}
