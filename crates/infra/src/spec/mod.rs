//! Read side of the spec registry: stores and feature-set specs.

pub mod cache;
pub mod file;
pub mod in_memory;

use featctl_core::subscription::{WILDCARD, compile_glob};
use featctl_core::{FeatureSetSpec, Store, Subscription};

pub use cache::CachingSpecService;
pub use file::FileSpecService;
pub use in_memory::InMemorySpecService;

/// Query surface the reconciliation engine consumes.
pub trait SpecService: Send + Sync {
    fn list_stores(&self) -> Result<Vec<Store>, SpecServiceError>;

    /// Coarse listing by project/name pattern; callers refine with the matcher.
    fn list_feature_sets(&self, filter: &FeatureSetFilter) -> Result<Vec<FeatureSetSpec>, SpecServiceError>;
}

impl<S: SpecService + ?Sized> SpecService for std::sync::Arc<S> {
    fn list_stores(&self) -> Result<Vec<Store>, SpecServiceError> {
        (**self).list_stores()
    }

    fn list_feature_sets(&self, filter: &FeatureSetFilter) -> Result<Vec<FeatureSetSpec>, SpecServiceError> {
        (**self).list_feature_sets(filter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecServiceError {
    #[error("malformed spec {what}: {message}")]
    Decode { what: String, message: String },

    #[error("invalid feature set filter: {0}")]
    InvalidFilter(String),

    #[error("spec registry I/O error: {0}")]
    Io(String),

    #[error("spec registry unavailable: {0}")]
    Unavailable(String),
}

/// Project/name patterns for listing feature sets.
///
/// The project is `*` or an exact name; the name is a glob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureSetFilter {
    pub project: String,
    pub name: String,
}

impl FeatureSetFilter {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
        }
    }

    pub fn all() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    /// Compile into a predicate over specs.
    pub fn predicate(&self) -> Result<impl Fn(&FeatureSetSpec) -> bool + '_, SpecServiceError> {
        let name = if self.name == WILDCARD {
            None
        } else {
            Some(compile_glob(&self.name).map_err(|e| SpecServiceError::InvalidFilter(e.to_string()))?)
        };

        Ok(move |spec: &FeatureSetSpec| {
            (self.project == WILDCARD || spec.project == self.project)
                && name.as_ref().is_none_or(|re| re.is_match(&spec.name))
        })
    }
}

impl From<&Subscription> for FeatureSetFilter {
    fn from(subscription: &Subscription) -> Self {
        Self::new(subscription.project.clone(), subscription.name.clone())
    }
}
