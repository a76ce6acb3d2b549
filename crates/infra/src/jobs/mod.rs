//! Ingestion job orchestration.
//!
//! ## Components
//!
//! - `JobManager`: capability set of an execution backend (Databricks, direct, no-op)
//! - `JobRepository`: persistence of jobs
//! - `JobCoordinator`: the reconciliation pass converging jobs to the specs
//! - `JobService`: operator actions on individual jobs

pub mod coordinator;
pub mod databricks;
pub mod direct;
pub mod manager;
pub mod noop;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{CoordinatorConfig, CoordinatorError, JobCoordinator, PassLock, PollFailure, PollReport};
pub use databricks::{DatabricksConfig, DatabricksJobManager, ReqwestHttpClient};
pub use direct::DirectJobManager;
pub use manager::{JobManager, JobManagerError, JobManagerRegistry, TransportError};
pub use noop::NoOpJobManager;
pub use service::{JobService, JobServiceError};
pub use store::{InMemoryJobRepository, JobFilter, JobRepository, RepositoryError};
