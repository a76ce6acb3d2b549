use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use featctl_core::{DomainError, FeatureSetSpec, Store};

use super::{FeatureSetFilter, SpecService, SpecServiceError};

/// Spec registry backed by a directory of JSON documents:
///
/// ```text
/// <root>/stores/*.json        one Store per file
/// <root>/feature_sets/*.json  one FeatureSetSpec per file
/// ```
///
/// Files are re-read on every call; wrap in a `CachingSpecService` to avoid that.
/// A malformed file is logged and skipped so one bad document cannot hide the rest.
/// Stores with unusable subscriptions are still listed; the coordinator rejects
/// them as configuration errors.
#[derive(Debug, Clone)]
pub struct FileSpecService {
    root: PathBuf,
}

impl FileSpecService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `*.json` files of a subdirectory, sorted by name. A missing subdirectory is empty.
    fn documents(&self, dir: &str) -> Result<Vec<(PathBuf, String)>, SpecServiceError> {
        if !self.root.is_dir() {
            return Err(SpecServiceError::Io(format!(
                "spec directory {} does not exist",
                self.root.display()
            )));
        }

        let dir = self.root.join(dir);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| SpecServiceError::Io(format!("{}: {e}", dir.display())))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            match fs::read_to_string(&path) {
                Ok(contents) => documents.push((path, contents)),
                Err(err) => warn!(path = %path.display(), error = %err, "unreadable spec file skipped"),
            }
        }
        Ok(documents)
    }
}

impl SpecService for FileSpecService {
    fn list_stores(&self) -> Result<Vec<Store>, SpecServiceError> {
        let stores = self
            .documents("stores")?
            .into_iter()
            .filter_map(|(path, json)| match Store::from_json(&json) {
                Ok(store) => Some(store),
                Err(DomainError::InvalidSubscription(_)) => serde_json::from_str::<Store>(&json).ok(),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "malformed store spec skipped");
                    None
                }
            })
            .collect();
        Ok(stores)
    }

    fn list_feature_sets(&self, filter: &FeatureSetFilter) -> Result<Vec<FeatureSetSpec>, SpecServiceError> {
        let accepts = filter.predicate()?;
        let feature_sets = self
            .documents("feature_sets")?
            .into_iter()
            .filter_map(|(path, json)| match FeatureSetSpec::from_json(&json) {
                Ok(spec) => Some(spec),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "malformed feature set spec skipped");
                    None
                }
            })
            .filter(|spec| accepts(spec))
            .collect();
        Ok(feature_sets)
    }
}
