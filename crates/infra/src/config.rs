//! Environment-driven configuration.
//!
//! Call [`load_dotenv`] first, then [`AppConfig::from_env`].

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use featctl_core::Runner;

use crate::jobs::coordinator::CoordinatorConfig;
use crate::jobs::databricks::DatabricksConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no job manager registered for runner {runner} (needed by store {store})")]
    MissingJobManager { runner: Runner, store: String },

    #[error("unsupported runner: {0}")]
    UnsupportedRunner(String),

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Load `.env` (silently ignored when missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Everything the `featctl` binary needs to wire itself up.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Directory holding `stores/*.json` and `feature_sets/*.json`. `None` starts
    /// with an empty in-memory registry.
    pub spec_dir: Option<PathBuf>,
    pub spec_cache_ttl: Duration,
    pub coordinator: CoordinatorConfig,
    /// Runner used for every store that needs streaming ingestion.
    pub runner: Runner,
    pub databricks: Option<DatabricksConfig>,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let runner = match vars.opt("FEATCTL_RUNNER") {
            Some(name) => Runner::from_str(&name).map_err(|_| ConfigError::UnsupportedRunner(name))?,
            None => Runner::Direct,
        };
        if runner == Runner::NoOp {
            return Err(ConfigError::UnsupportedRunner(runner.name().to_string()));
        }

        let coordinator = CoordinatorConfig {
            poll_interval: Duration::from_secs(vars.parse_or("FEATCTL_POLL_INTERVAL_SECS", 60u64)?),
            max_concurrent: vars.parse_or("FEATCTL_MAX_CONCURRENT", 4usize)?.max(1),
            name: "job-coordinator".to_string(),
        };

        let databricks = match runner {
            Runner::Databricks => Some(databricks_config(&vars)?),
            _ => None,
        };

        Ok(Self {
            bind_addr: vars.or("FEATCTL_BIND_ADDR", "0.0.0.0:8080"),
            spec_dir: vars.opt("FEATCTL_SPEC_DIR").map(PathBuf::from),
            spec_cache_ttl: Duration::from_secs(vars.parse_or("FEATCTL_SPEC_CACHE_TTL_SECS", 30u64)?),
            coordinator,
            runner,
            databricks,
            http_timeout: Duration::from_secs(vars.parse_or("DATABRICKS_HTTP_TIMEOUT_SECS", 30u64)?),
        })
    }
}

fn databricks_config<F>(vars: &Vars<F>) -> Result<DatabricksConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = vars.opt("DATABRICKS_HOST").ok_or(ConfigError::Missing("DATABRICKS_HOST"))?;
    let token = vars.opt("DATABRICKS_TOKEN").ok_or(ConfigError::Missing("DATABRICKS_TOKEN"))?;
    let jar_location = vars
        .opt("DATABRICKS_JAR_LOCATION")
        .ok_or(ConfigError::Missing("DATABRICKS_JAR_LOCATION"))?;

    let mut config = DatabricksConfig::new(host, token);
    config.jar_location = jar_location;
    config.num_workers = vars.parse_or("DATABRICKS_NUM_WORKERS", config.num_workers)?;
    config.spark_version = vars.or("DATABRICKS_SPARK_VERSION", &config.spark_version);
    config.node_type_id = vars.or("DATABRICKS_NODE_TYPE_ID", &config.node_type_id);
    config.main_class_name = vars.or("DATABRICKS_MAIN_CLASS", &config.main_class_name);
    config.max_retries = vars.parse_or("DATABRICKS_MAX_RETRIES", config.max_retries)?;
    config.status_poll_interval = Duration::from_millis(vars.parse_or("DATABRICKS_STATUS_POLL_MILLIS", 2000u64)?);

    // 0 waits forever.
    config.max_start_wait = match vars.parse_or("DATABRICKS_MAX_START_WAIT_SECS", 600u64)? {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(config)
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn opt(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.opt(key) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }
}
