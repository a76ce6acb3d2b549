//! Test doubles shared by the coordinator and job service tests.

use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;

use featctl_core::{Job, JobId, JobStatus, Runner, Source};

use super::manager::{JobManager, JobManagerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start(JobId),
    Abort(String),
    Status(JobId),
}

/// Job manager that records every call and answers from settable state.
#[derive(Debug)]
pub struct RecordingJobManager {
    runner: Runner,
    calls: Mutex<Vec<Call>>,
    next_run: AtomicUsize,
    status: Mutex<JobStatus>,
    /// `None`: starts succeed. `Some(None)`: every start fails.
    /// `Some(Some(source))`: starts for that source fail.
    failing: Mutex<Option<Option<Source>>>,
    /// Parks the next status call: signals the first sender, waits on the receiver.
    status_gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl RecordingJobManager {
    pub fn new(runner: Runner) -> Self {
        Self {
            runner,
            calls: Mutex::new(Vec::new()),
            next_run: AtomicUsize::new(1),
            status: Mutex::new(JobStatus::Running),
            failing: Mutex::new(None),
            status_gate: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Start(_)))
            .count()
    }

    /// Status reported for every launched job from now on.
    pub fn report_status(&self, status: JobStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn fail_all_starts(&self) {
        *self.failing.lock().unwrap() = Some(None);
    }

    pub fn fail_starts_for(&self, source: Source) {
        *self.failing.lock().unwrap() = Some(Some(source));
    }

    pub fn heal(&self) {
        *self.failing.lock().unwrap() = None;
    }

    /// Hold the next `get_job_status` call. The first channel fires once the call
    /// is parked; sending on the second lets it return.
    pub fn park_next_status_call(&self) -> (Receiver<()>, Sender<()>) {
        let (parked_tx, parked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.status_gate.lock().unwrap() = Some((parked_tx, release_rx));
        (parked_rx, release_tx)
    }
}

impl JobManager for RecordingJobManager {
    fn runner_type(&self) -> Runner {
        self.runner
    }

    fn start_job(&self, job: &Job) -> Result<Job, JobManagerError> {
        self.calls.lock().unwrap().push(Call::Start(job.id.clone()));

        let fails = match &*self.failing.lock().unwrap() {
            None => false,
            Some(None) => true,
            Some(Some(source)) => *source == job.source,
        };
        if fails {
            return Err(JobManagerError::JobExecution {
                job_id: job.id.to_string(),
                status: 500,
                message: "scripted failure".to_string(),
            });
        }

        let run = self.next_run.fetch_add(1, Ordering::SeqCst);
        let mut started = job.clone();
        started.ext_id = format!("{}-{run}", self.runner.name());
        started.status = JobStatus::Running;
        started.updated_at = Utc::now();
        Ok(started)
    }

    fn abort_job(&self, ext_id: &str) -> Result<(), JobManagerError> {
        self.calls.lock().unwrap().push(Call::Abort(ext_id.to_string()));
        Ok(())
    }

    fn get_job_status(&self, job: &Job) -> JobStatus {
        self.calls.lock().unwrap().push(Call::Status(job.id.clone()));
        let gate = self.status_gate.lock().unwrap().take();
        if let Some((parked, release)) = gate {
            let _ = parked.send(());
            let _ = release.recv();
        }
        *self.status.lock().unwrap()
    }
}
