//! Background workers.

pub mod coordinator_worker;

pub use coordinator_worker::{CoordinatorWorker, WorkerHandle};
