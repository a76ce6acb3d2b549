//! Databricks run state -> canonical job status.

use featctl_core::JobStatus;

/// Map a run's `life_cycle_state` / `result_state` pair onto [`JobStatus`].
///
/// `INTERNAL_ERROR` is an error whatever the outcome says. Otherwise the table is
/// keyed on `LIFECYCLE_RESULT` when an outcome is present and on the life-cycle
/// alone when it is not; both parts are compared upper-cased.
pub fn map_run_state(life_cycle_state: &str, result_state: Option<&str>) -> JobStatus {
    let life_cycle = life_cycle_state.trim().to_ascii_uppercase();
    if life_cycle == "INTERNAL_ERROR" {
        return JobStatus::Error;
    }

    let key = match result_state {
        Some(result) => format!("{life_cycle}_{}", result.trim().to_ascii_uppercase()),
        None => life_cycle,
    };
    lookup(&key)
}

fn lookup(key: &str) -> JobStatus {
    match key {
        "PENDING" => JobStatus::Pending,
        "RUNNING" => JobStatus::Running,
        // Still draining its last batch.
        "TERMINATING" => JobStatus::Running,
        "TERMINATING_CANCELED" => JobStatus::Aborting,
        "SKIPPED" => JobStatus::Aborted,
        "TERMINATED_SUCCESS" => JobStatus::Completed,
        "TERMINATED_FAILED" => JobStatus::Error,
        "TERMINATED_TIMEDOUT" => JobStatus::Error,
        "TERMINATED_CANCELED" => JobStatus::Aborted,
        _ => JobStatus::Unknown,
    }
}
