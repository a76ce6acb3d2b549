use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::jobs::coordinator::JobCoordinator;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    ///
    /// A pass in flight finishes first.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Periodic reconciliation loop.
///
/// Runs a pass immediately, then once per `poll_interval`. A failed pass is logged
/// and retried on the next tick.
#[derive(Debug)]
pub struct CoordinatorWorker;

impl CoordinatorWorker {
    pub fn spawn(coordinator: Arc<JobCoordinator>) -> std::io::Result<WorkerHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let name = coordinator.config().name.clone();
        let interval = coordinator.config().poll_interval;

        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(&name, &coordinator, interval, &shutdown_rx))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop(name: &str, coordinator: &JobCoordinator, interval: Duration, shutdown_rx: &mpsc::Receiver<()>) {
    info!(worker = name, interval_ms = featctl_observability::millis(interval), "coordinator worker started");

    loop {
        if let Err(err) = coordinator.poll() {
            warn!(worker = name, error = %err, "reconciliation pass failed");
        }

        match shutdown_rx.recv_timeout(interval) {
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            // Shutdown requested, or every handle dropped.
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(worker = name, "coordinator worker stopped");
}
