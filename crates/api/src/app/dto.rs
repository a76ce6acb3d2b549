use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use featctl_core::{FeatureSetRef, Job, JobStatus, Source};
use featctl_infra::jobs::JobFilter;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// `GET /jobs?store=online&feature_set=project1/fs1`
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub store: Option<String>,
    pub feature_set: Option<String>,
}

impl ListJobsQuery {
    pub fn into_filter(self) -> Result<JobFilter, axum::response::Response> {
        let feature_set = match self.feature_set {
            Some(raw) => match raw.parse::<FeatureSetRef>() {
                Ok(reference) => Some(reference),
                Err(e) => {
                    return Err(errors::json_error(
                        axum::http::StatusCode::BAD_REQUEST,
                        "invalid_filter",
                        e.to_string(),
                    ))
                }
            },
            None => None,
        };
        Ok(JobFilter {
            store: self.store,
            feature_set,
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: String,
    pub ext_id: String,
    pub runner: &'static str,
    pub status: JobStatus,
    pub source: Source,
    pub store: String,
    pub feature_sets: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            ext_id: job.ext_id.clone(),
            runner: job.runner.name(),
            status: job.status,
            source: job.source.clone(),
            store: job.store.name.clone(),
            feature_sets: job.feature_sets.keys().map(ToString::to_string).collect(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}
