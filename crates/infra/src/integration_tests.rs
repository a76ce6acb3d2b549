//! Integration tests for the full reconciliation pipeline.
//!
//! Tests: spec files → cached spec service → coordinator → Databricks/no-op
//! backends → job repository → job service
//!
//! Verifies:
//! - Stores fan out into one job per (store, source) pair on the right runner
//! - Repeated passes are idempotent
//! - An operator abort flows through the backend and is settled by the next pass
//! - A store file with an unusable subscription fails the pass

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use featctl_core::{JobStatus, Runner};

    use crate::jobs::databricks::http::testing::ScriptedHttpClient;
    use crate::jobs::databricks::{DatabricksConfig, DatabricksJobManager, HttpResponse};
    use crate::jobs::{
        CoordinatorConfig, CoordinatorError, InMemoryJobRepository, JobCoordinator, JobFilter, JobManagerRegistry,
        JobRepository, JobService, NoOpJobManager,
    };
    use crate::spec::{CachingSpecService, FileSpecService};

    const KAFKA_1: &str = r#"{"type":"KAFKA","bootstrap_servers":"kafka:9092","topic":"t1"}"#;
    const KAFKA_2: &str = r#"{"type":"KAFKA","bootstrap_servers":"kafka:9092","topic":"t2"}"#;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn spec_dir(root: &Path) {
        write(
            root,
            "stores/online.json",
            r#"{"name":"online","config":{"type":"REDIS","host":"redis","port":6379},
                "subscriptions":[{"project":"project1","name":"*"}]}"#,
        );
        write(
            root,
            "stores/lake.json",
            r#"{"name":"lake","config":{"type":"FILE","path":"/data"},
                "subscriptions":[{"project":"*","name":"*"}]}"#,
        );
        for (file, project, name, source) in [
            ("fs1", "project1", "fs1", KAFKA_1),
            ("fs2", "project1", "fs2", KAFKA_1),
            ("fs3", "project2", "fs3", KAFKA_2),
        ] {
            write(
                root,
                &format!("feature_sets/{file}.json"),
                &format!(r#"{{"project":"{project}","name":"{name}","source":{source}}}"#),
            );
        }
    }

    fn run_state(life_cycle: &str, result: Option<&str>) -> HttpResponse {
        let state = match result {
            Some(result) => serde_json::json!({"life_cycle_state": life_cycle, "result_state": result}),
            None => serde_json::json!({"life_cycle_state": life_cycle}),
        };
        HttpResponse::ok(serde_json::json!({ "state": state }).to_string())
    }

    struct Pipeline {
        dir: tempfile::TempDir,
        client: Arc<ScriptedHttpClient>,
        repository: Arc<InMemoryJobRepository>,
        coordinator: JobCoordinator,
        service: JobService,
    }

    fn pipeline() -> Pipeline {
        let dir = tempfile::tempdir().unwrap();
        spec_dir(dir.path());

        let client = Arc::new(
            ScriptedHttpClient::new()
                .respond("jobs/create", HttpResponse::ok(r#"{"job_id":1}"#))
                .respond("jobs/run-now", HttpResponse::ok(r#"{"run_id":"11"}"#))
                .respond("jobs/runs/get", run_state("RUNNING", None))
                .respond("jobs/runs/cancel", HttpResponse::ok("{}")),
        );
        let mut config = DatabricksConfig::new("https://databricks", "TOKEN");
        config.status_poll_interval = Duration::from_millis(1);
        let databricks = DatabricksJobManager::new(config, client.clone());

        let managers = JobManagerRegistry::new(Runner::Databricks)
            .register(Arc::new(databricks))
            .register(Arc::new(NoOpJobManager));
        let specs = CachingSpecService::new(FileSpecService::new(dir.path()), Duration::from_secs(3600));
        let repository = InMemoryJobRepository::arc();

        let coordinator = JobCoordinator::new(
            Arc::new(specs),
            repository.clone(),
            managers,
            CoordinatorConfig::default().with_max_concurrent(2),
        )
        .unwrap();
        let service = coordinator.job_service();

        Pipeline {
            dir,
            client,
            repository,
            coordinator,
            service,
        }
    }

    #[test]
    fn stores_fan_out_into_jobs_per_source() {
        let p = pipeline();

        let report = p.coordinator.poll().unwrap();

        assert_eq!(report.stores_scanned, 2);
        assert_eq!(report.desired_jobs, 3);
        assert_eq!(report.started, 3);

        let online = p
            .service
            .list_jobs(&JobFilter {
                store: Some("online".to_string()),
                ..JobFilter::default()
            })
            .unwrap();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].runner, Runner::Databricks);
        assert_eq!(online[0].ext_id, "11");
        assert_eq!(online[0].feature_sets.len(), 2);

        let lake = p
            .service
            .list_jobs(&JobFilter {
                store: Some("lake".to_string()),
                ..JobFilter::default()
            })
            .unwrap();
        assert_eq!(lake.len(), 2);
        assert!(lake.iter().all(|j| j.runner == Runner::NoOp && j.status == JobStatus::Running));

        assert_eq!(p.client.requests_to("jobs/create").len(), 1);
    }

    #[test]
    fn repeated_passes_are_idempotent() {
        let p = pipeline();

        p.coordinator.poll().unwrap();
        let report = p.coordinator.poll().unwrap();

        assert_eq!(report.started, 0);
        assert_eq!(report.unchanged, 3);
        assert_eq!(report.saved, 0);
        assert_eq!(p.repository.saved_batches().unwrap().len(), 1);
        assert_eq!(p.client.requests_to("jobs/create").len(), 1);
    }

    #[test]
    fn operator_abort_is_settled_by_the_next_pass() {
        let p = pipeline();
        p.coordinator.poll().unwrap();
        let online = p
            .service
            .list_jobs(&JobFilter {
                store: Some("online".to_string()),
                ..JobFilter::default()
            })
            .unwrap()
            .remove(0);

        let aborting = p.service.abort_job(&online.id).unwrap();
        assert_eq!(aborting.status, JobStatus::Aborting);
        let cancels = p.client.requests_to("jobs/runs/cancel");
        assert_eq!(cancels.len(), 1);
        assert_eq!(cancels[0].body.as_ref().unwrap()["run_id"], 11);

        p.client.set("jobs/runs/get", run_state("TERMINATED", Some("CANCELED")));
        let report = p.coordinator.poll().unwrap();

        assert_eq!(report.status_changes, 1);
        assert_eq!(p.service.get_job(&online.id).unwrap().status, JobStatus::Aborted);

        // The pair is still desired, so a fresh job replaces the aborted one.
        p.client.set("jobs/runs/get", run_state("RUNNING", None));
        let report = p.coordinator.poll().unwrap();

        assert_eq!(report.started, 1);
        let online_jobs = p
            .repository
            .list(&JobFilter {
                store: Some("online".to_string()),
                ..JobFilter::default()
            })
            .unwrap();
        assert_eq!(online_jobs.len(), 2);
        assert!(online_jobs.iter().any(|j| j.id != online.id && j.status == JobStatus::Running));
    }

    #[test]
    fn bad_subscription_in_a_store_file_fails_the_pass() {
        let p = pipeline();
        write(
            p.dir.path(),
            "stores/broken.json",
            r#"{"name":"broken","config":{"type":"REDIS","host":"redis","port":6379},
                "subscriptions":[{"project":"","name":"fs1"}]}"#,
        );

        let err = p.coordinator.poll().unwrap_err();

        assert!(matches!(err, CoordinatorError::InvalidSubscription { ref store, .. } if store == "broken"));
        assert!(p.repository.saved_batches().unwrap().is_empty());
        assert!(p.client.requests().is_empty());
    }
}
