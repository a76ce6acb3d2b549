//! HTTP surface of the feature store control plane.

pub mod app;
pub mod middleware;
