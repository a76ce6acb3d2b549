//! Service wiring: spec registry, job repository, backends, coordinator.

use std::sync::Arc;

use tracing::{info, warn};

use featctl_core::Runner;
use featctl_infra::config::{AppConfig, ConfigError};
use featctl_infra::jobs::{
    CoordinatorConfig, DatabricksJobManager, DirectJobManager, InMemoryJobRepository, JobCoordinator, JobManager,
    JobManagerRegistry, JobRepository, JobService, NoOpJobManager, ReqwestHttpClient, TransportError,
};
use featctl_infra::spec::{CachingSpecService, FileSpecService, InMemorySpecService, SpecService};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unable to build the Databricks HTTP client: {0}")]
    HttpClient(#[from] TransportError),
}

/// Everything the handlers and the coordinator worker share.
pub struct AppServices {
    pub coordinator: Arc<JobCoordinator>,
    pub jobs: JobService,
}

impl AppServices {
    pub fn new(
        specs: Arc<dyn SpecService>,
        repository: Arc<dyn JobRepository>,
        managers: JobManagerRegistry,
        config: CoordinatorConfig,
    ) -> Result<Self, ConfigError> {
        let coordinator = JobCoordinator::new(specs, repository, managers, config)?;
        Ok(Self {
            jobs: coordinator.job_service(),
            coordinator: Arc::new(coordinator),
        })
    }

    /// Direct runner, in-memory repository; used by local runs and tests.
    pub fn in_process(specs: Arc<dyn SpecService>, config: CoordinatorConfig) -> Result<Self, ConfigError> {
        let managers = JobManagerRegistry::new(Runner::Direct)
            .register(Arc::new(DirectJobManager::new()))
            .register(Arc::new(NoOpJobManager));
        Self::new(specs, InMemoryJobRepository::arc(), managers, config)
    }
}

/// Wire services from configuration.
///
/// Builds a blocking HTTP client when the Databricks runner is selected, so it must
/// be called outside of the async runtime.
pub fn build_services(config: &AppConfig) -> Result<AppServices, BuildError> {
    let specs: Arc<dyn SpecService> = match &config.spec_dir {
        Some(dir) => {
            info!(spec_dir = %dir.display(), "reading specs from directory");
            Arc::new(CachingSpecService::new(FileSpecService::new(dir), config.spec_cache_ttl))
        }
        None => {
            warn!("FEATCTL_SPEC_DIR not set; starting with an empty spec registry");
            Arc::new(InMemorySpecService::new())
        }
    };

    let streaming: Arc<dyn JobManager> = match config.runner {
        Runner::Databricks => {
            let databricks = config
                .databricks
                .clone()
                .ok_or(ConfigError::Missing("DATABRICKS_HOST"))?;
            let client = ReqwestHttpClient::new(config.http_timeout)?;
            Arc::new(DatabricksJobManager::new(databricks, client))
        }
        Runner::Direct => Arc::new(DirectJobManager::new()),
        Runner::NoOp => return Err(ConfigError::UnsupportedRunner(Runner::NoOp.name().to_string()).into()),
    };
    let managers = JobManagerRegistry::new(config.runner)
        .register(streaming)
        .register(Arc::new(NoOpJobManager));

    info!(runner = config.runner.name(), "job backends ready");
    Ok(AppServices::new(
        specs,
        InMemoryJobRepository::arc(),
        managers,
        config.coordinator.clone(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: Vec<(String, String)> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())).unwrap()
    }

    #[test]
    fn builds_direct_services_without_a_spec_dir() {
        let services = build_services(&config(&[])).unwrap();
        assert_eq!(services.coordinator.poll().unwrap().stores_scanned, 0);
    }

    #[test]
    fn builds_databricks_services() {
        let services = build_services(&config(&[
            ("FEATCTL_RUNNER", "DatabricksRunner"),
            ("DATABRICKS_HOST", "https://databricks"),
            ("DATABRICKS_TOKEN", "TOKEN"),
            ("DATABRICKS_JAR_LOCATION", "dbfs:/ingestion.jar"),
        ]))
        .unwrap();
        assert_eq!(services.coordinator.config().name, "job-coordinator");
    }
}
