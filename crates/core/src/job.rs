//! Ingestion jobs and their lifecycle.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::feature_set::{FeatureSetRef, FeatureSetSpec};
use crate::id::JobId;
use crate::source::Source;
use crate::store::Store;

/// Execution backend a job runs on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Runner {
    /// In-process runner for local development.
    #[serde(rename = "DirectRunner")]
    Direct,
    /// Databricks job service, driven over REST.
    #[serde(rename = "DatabricksRunner")]
    Databricks,
    /// Stores without streaming ingestion.
    #[serde(rename = "NoOpRunner")]
    NoOp,
}

impl Runner {
    /// Human readable name, as used in logs and config files.
    pub fn name(&self) -> &'static str {
        match self {
            Runner::Direct => "DirectRunner",
            Runner::Databricks => "DatabricksRunner",
            Runner::NoOp => "NoOpRunner",
        }
    }
}

impl fmt::Display for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Runner {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Runner::Direct, Runner::Databricks, Runner::NoOp]
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::validation(format!("unknown runner: {s}")))
    }
}

/// Job lifecycle status.
///
/// ```text
/// PENDING -> RUNNING -> {COMPLETED, ERROR, ABORTED}
///            RUNNING -> ABORTING -> ABORTED
/// any     -> UNKNOWN (backend unreachable; re-resolved on the next poll)
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Unknown,
    Pending,
    Running,
    Completed,
    Aborting,
    Aborted,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error | JobStatus::Aborted)
    }

    /// Pending or aborting: the backend has not settled yet.
    pub fn is_transitional(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Aborting)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;

        if *self == next || next == Unknown {
            return true;
        }
        match self {
            Unknown => true,
            Pending => matches!(next, Running | Error | Aborting | Aborted),
            Running => matches!(next, Completed | Error | Aborting | Aborted),
            Aborting => matches!(next, Aborted | Error),
            Completed | Error | Aborted => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Unknown => "UNKNOWN",
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Aborting => "ABORTING",
            JobStatus::Aborted => "ABORTED",
            JobStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingestion job, bound to exactly one (store, source) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Backend-assigned id; empty until the backend accepted the job.
    pub ext_id: String,
    pub runner: Runner,
    pub source: Source,
    pub store: Store,
    /// Keyed by reference, so membership compares as a set.
    pub feature_sets: BTreeMap<FeatureSetRef, FeatureSetSpec>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new `PENDING` job for a (store, source) pair.
    pub fn new(runner: Runner, source: Source, store: Store) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::derive(&source, &store, now),
            ext_id: String::new(),
            runner,
            source,
            store,
            feature_sets: BTreeMap::new(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    pub fn with_feature_sets<I>(mut self, feature_sets: I) -> Self
    where
        I: IntoIterator<Item = FeatureSetSpec>,
    {
        self.feature_sets.clear();
        for fs in feature_sets {
            self.add_feature_set(fs);
        }
        self
    }

    /// Add (or replace) a feature set, keyed by its reference.
    pub fn add_feature_set(&mut self, feature_set: FeatureSetSpec) {
        self.feature_sets.insert(feature_set.reference(), feature_set);
    }

    pub fn feature_set_refs(&self) -> impl Iterator<Item = &FeatureSetRef> {
        self.feature_sets.keys()
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Whether a backend has ever accepted this job.
    pub fn is_launched(&self) -> bool {
        !self.ext_id.is_empty()
    }

    /// Move to `next`, enforcing the lifecycle graph.
    pub fn transition(&mut self, next: JobStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if self.status != next {
            self.status = next;
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    /// Whether this job carries the same input as `expected`: runner, source,
    /// store, status and (unordered) feature-set membership.
    ///
    /// Ids and timestamps are ignored.
    pub fn matches_input(&self, expected: &Job) -> bool {
        self.runner == expected.runner
            && self.source == expected.source
            && self.store == expected.store
            && self.status == expected.status
            && self.feature_sets == expected.feature_sets
    }

    /// Whether the store/source pair and feature-set membership equal the desired ones.
    pub fn has_composition(&self, store: &Store, source: &Source, feature_sets: &[FeatureSetSpec]) -> bool {
        if self.store != *store || self.source != *source || self.feature_sets.len() != feature_sets.len() {
            return false;
        }
        feature_sets
            .iter()
            .all(|fs| self.feature_sets.get(&fs.reference()) == Some(fs))
    }
}
