use std::collections::BTreeMap;
use std::sync::RwLock;

use featctl_core::{FeatureSetRef, FeatureSetSpec, Store};

use super::{FeatureSetFilter, SpecService, SpecServiceError};

/// In-memory spec registry for tests/dev.
///
/// Stores keep registration order; feature sets are listed by reference.
#[derive(Debug, Default)]
pub struct InMemorySpecService {
    stores: RwLock<Vec<Store>>,
    feature_sets: RwLock<BTreeMap<FeatureSetRef, FeatureSetSpec>>,
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> SpecServiceError {
    SpecServiceError::Unavailable("spec registry lock poisoned".to_string())
}

fn invalid(what: String, err: featctl_core::DomainError) -> SpecServiceError {
    SpecServiceError::Decode {
        what,
        message: err.to_string(),
    }
}

impl InMemorySpecService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace (by name) a store.
    pub fn register_store(&self, store: Store) -> Result<(), SpecServiceError> {
        store
            .validate()
            .map_err(|e| invalid(format!("store {}", store.name), e))?;

        let mut stores = self.stores.write().map_err(poisoned)?;
        match stores.iter_mut().find(|s| s.name == store.name) {
            Some(existing) => *existing = store,
            None => stores.push(store),
        }
        Ok(())
    }

    /// Register or replace (by reference) a feature set.
    pub fn register_feature_set(&self, spec: FeatureSetSpec) -> Result<(), SpecServiceError> {
        spec.validate()
            .map_err(|e| invalid(format!("feature set {}", spec.reference()), e))?;

        self.feature_sets
            .write()
            .map_err(poisoned)?
            .insert(spec.reference(), spec);
        Ok(())
    }

    pub fn remove_feature_set(&self, reference: &FeatureSetRef) -> Result<Option<FeatureSetSpec>, SpecServiceError> {
        Ok(self.feature_sets.write().map_err(poisoned)?.remove(reference))
    }
}

impl SpecService for InMemorySpecService {
    fn list_stores(&self) -> Result<Vec<Store>, SpecServiceError> {
        Ok(self.stores.read().map_err(poisoned)?.clone())
    }

    fn list_feature_sets(&self, filter: &FeatureSetFilter) -> Result<Vec<FeatureSetSpec>, SpecServiceError> {
        let accepts = filter.predicate()?;
        let feature_sets = self.feature_sets.read().map_err(poisoned)?;
        Ok(feature_sets.values().filter(|fs| accepts(fs)).cloned().collect())
    }
}
