//! Infrastructure layer: job backends, repository, spec registry access, the
//! reconciliation engine and its worker, configuration.

pub mod config;
pub mod jobs;
pub mod spec;
pub mod workers;

#[cfg(test)]
mod integration_tests;
