//! Databricks Jobs API backend.
//!
//! Starting a job is create -> run-now -> wait until the run is RUNNING. Status
//! comes from `runs/get`, cancellation goes through `runs/cancel`.

pub mod http;
pub mod state;
pub mod types;

use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use featctl_core::{Job, JobStatus, Runner};

use crate::jobs::manager::{JobManager, JobManagerError, TransportError};

pub use http::{HttpClient, HttpRequest, HttpResponse, Method, ReqwestHttpClient};
use state::map_run_state;
use types::{
    CancelRunRequest, CreateRequest, CreateResponse, Library, NewCluster, RunNowRequest, RunNowResponse, RunResponse,
    SparkJarTask,
};

/// Cluster definition and API access for the Databricks backend.
#[derive(Debug, Clone)]
pub struct DatabricksConfig {
    /// Workspace URL, e.g. `https://adb-1234.azuredatabricks.net`.
    pub host: String,
    pub token: String,
    pub num_workers: u32,
    pub spark_version: String,
    pub node_type_id: String,
    /// Ingestion jar, installed as a cluster library.
    pub jar_location: String,
    pub main_class_name: String,
    /// Retry count forwarded to the job definition; `-1` retries indefinitely.
    pub max_retries: i32,
    pub status_poll_interval: Duration,
    /// `None` waits for RUNNING without bound.
    pub max_start_wait: Option<Duration>,
}

impl DatabricksConfig {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            num_workers: 1,
            spark_version: "6.6.x-scala2.11".to_string(),
            node_type_id: "Standard_D3_v2".to_string(),
            jar_location: String::new(),
            main_class_name: "feast.ingestion.IngestionJob".to_string(),
            max_retries: -1,
            status_poll_interval: Duration::from_secs(2),
            max_start_wait: Some(Duration::from_secs(600)),
        }
    }
}

pub struct DatabricksJobManager<C = ReqwestHttpClient> {
    config: DatabricksConfig,
    client: C,
}

impl<C> std::fmt::Debug for DatabricksJobManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabricksJobManager")
            .field("host", &self.config.host)
            .finish_non_exhaustive()
    }
}

impl<C: HttpClient> DatabricksJobManager<C> {
    pub fn new(config: DatabricksConfig, client: C) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &DatabricksConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/{}", self.config.host.trim_end_matches('/'), endpoint)
    }

    fn send(&self, method: Method, url: String, body: Option<serde_json::Value>) -> Result<HttpResponse, TransportError> {
        let request = HttpRequest {
            method,
            url,
            bearer_token: self.config.token.clone(),
            body,
        };
        self.client.execute(&request)
    }

    /// POST `body` to `endpoint` and decode the answer.
    fn post<B, R>(&self, job_id: &str, endpoint: &str, body: &B) -> Result<R, JobManagerError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_value(body).map_err(|e| JobManagerError::InvalidSpec {
            job_id: job_id.to_string(),
            message: e.to_string(),
        })?;

        let response = self
            .send(Method::Post, self.url(endpoint), Some(payload))
            .map_err(|source| JobManagerError::Transport {
                job_id: job_id.to_string(),
                source,
            })?;

        if !response.is_success() {
            return Err(JobManagerError::JobExecution {
                job_id: job_id.to_string(),
                status: response.status,
                message: response.body,
            });
        }

        serde_json::from_str(&response.body).map_err(|e| JobManagerError::Transport {
            job_id: job_id.to_string(),
            source: TransportError::Decode(e.to_string()),
        })
    }

    fn create_job(&self, job: &Job) -> Result<i64, JobManagerError> {
        let request = CreateRequest {
            name: job.id.to_string(),
            new_cluster: NewCluster {
                num_workers: self.config.num_workers,
                spark_version: self.config.spark_version.clone(),
                node_type_id: self.config.node_type_id.clone(),
            },
            libraries: vec![Library {
                jar: self.config.jar_location.clone(),
            }],
            spark_jar_task: SparkJarTask {
                main_class_name: self.config.main_class_name.clone(),
            },
            max_retries: self.config.max_retries,
        };

        let created: CreateResponse = self.post(job.id.as_str(), "jobs/create", &request)?;
        debug!(job_id = %job.id, databricks_job_id = created.job_id, "databricks job created");
        Ok(created.job_id)
    }

    fn run_job(&self, job: &Job, databricks_job_id: i64) -> Result<String, JobManagerError> {
        let request = RunNowRequest {
            job_id: databricks_job_id,
            jar_params: jar_params(job)?,
        };

        let run: RunNowResponse = self.post(job.id.as_str(), "jobs/run-now", &request)?;
        Ok(run.run_id.to_string())
    }

    /// Poll until the run is RUNNING. A terminal status, or the deadline, fails the start.
    fn wait_for_job_to_run(&self, job: &Job) -> Result<(), JobManagerError> {
        let started = Instant::now();
        loop {
            let status = self.get_job_status(job);
            if status == JobStatus::Running {
                return Ok(());
            }
            if status.is_terminal() {
                return Err(JobManagerError::StartupFailed {
                    job_id: job.id.to_string(),
                    status,
                });
            }
            if let Some(max_wait) = self.config.max_start_wait {
                if started.elapsed() >= max_wait {
                    return Err(JobManagerError::StartupTimeout {
                        job_id: job.id.to_string(),
                        waited: started.elapsed(),
                    });
                }
            }
            thread::sleep(self.config.status_poll_interval);
        }
    }

    fn fetch_run_status(&self, run_id: &str) -> Result<JobStatus, TransportError> {
        let url = format!("{}?run_id={}", self.url("jobs/runs/get"), run_id);
        let response = self.send(Method::Get, url, None)?;
        if !response.is_success() {
            return Err(TransportError::Status {
                status: response.status,
                body: response.body,
            });
        }

        let run: RunResponse = serde_json::from_str(&response.body).map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(map_run_state(
            &run.state.life_cycle_state,
            run.state.result_state.as_deref(),
        ))
    }
}

/// Arguments handed to the ingestion jar: the job id and the JSON-encoded specs.
fn jar_params(job: &Job) -> Result<Vec<String>, JobManagerError> {
    let feature_sets: Vec<_> = job.feature_sets.values().collect();

    Ok(vec![
        format!("--job-id={}", job.id),
        format!("--source={}", to_json(job, &job.source)?),
        format!("--store={}", to_json(job, &job.store)?),
        format!("--feature-sets={}", to_json(job, &feature_sets)?),
    ])
}

fn to_json<T: Serialize>(job: &Job, value: &T) -> Result<String, JobManagerError> {
    serde_json::to_string(value).map_err(|e| JobManagerError::InvalidSpec {
        job_id: job.id.to_string(),
        message: e.to_string(),
    })
}

impl<C: HttpClient> JobManager for DatabricksJobManager<C> {
    fn runner_type(&self) -> Runner {
        Runner::Databricks
    }

    fn start_job(&self, job: &Job) -> Result<Job, JobManagerError> {
        let databricks_job_id = self.create_job(job)?;
        let run_id = self.run_job(job, databricks_job_id)?;

        let mut started = job.clone();
        started.ext_id = run_id;
        started.status = JobStatus::Pending;
        started.updated_at = Utc::now();

        if let Err(err) = self.wait_for_job_to_run(&started) {
            // The run stays live remotely unless cancelled; the job is persisted
            // without this run id.
            if let Err(cancel) = self.abort_job(&started.ext_id) {
                warn!(
                    job_id = %started.id,
                    ext_id = %started.ext_id,
                    error = %cancel,
                    "unable to cancel run after failed start"
                );
            }
            return Err(err);
        }

        started.status = JobStatus::Running;
        started.updated_at = Utc::now();
        info!(job_id = %started.id, ext_id = %started.ext_id, "databricks run started");
        Ok(started)
    }

    fn abort_job(&self, ext_id: &str) -> Result<(), JobManagerError> {
        if ext_id.is_empty() {
            return Ok(());
        }
        let run_id = ext_id.parse::<i64>().map_err(|_| JobManagerError::InvalidSpec {
            job_id: ext_id.to_string(),
            message: format!("not a databricks run id: {ext_id}"),
        })?;

        let _: serde_json::Value = self.post(ext_id, "jobs/runs/cancel", &CancelRunRequest { run_id })?;
        info!(ext_id, "databricks run cancelled");
        Ok(())
    }

    fn get_job_status(&self, job: &Job) -> JobStatus {
        if job.ext_id.is_empty() {
            return JobStatus::Unknown;
        }
        match self.fetch_run_status(&job.ext_id) {
            Ok(status) => status,
            Err(err) => {
                error!(job_id = %job.id, ext_id = %job.ext_id, error = %err, "unable to retrieve databricks run status");
                JobStatus::Unknown
            }
        }
    }
}
