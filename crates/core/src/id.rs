//! Strongly-typed job identifiers.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::source::Source;
use crate::store::Store;

/// Internal identifier of an ingestion job.
///
/// Derived from the (store, source) pair plus the creation instant, e.g.
/// `kafka-3f9a01c2-to-online-20240101120000000`. The id is fixed at creation and
/// survives feature-set membership changes and restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Derive the id of a new job for `source` feeding `store`.
    pub fn derive(source: &Source, store: &Store, created_at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}-{}-to-{}-{}",
            source.source_type(),
            source.fingerprint(),
            store.name,
            created_at.format("%Y%m%d%H%M%S%3f")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() || s.contains('/') {
            return Err(DomainError::invalid_id(format!("JobId: {s:?}")));
        }
        Ok(Self(s.to_string()))
    }
}
