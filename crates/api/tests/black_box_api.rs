use std::sync::Arc;

use featctl_api::app::services::AppServices;
use featctl_core::{FeatureSetSpec, Source, Store, StoreConfig, Subscription};
use featctl_infra::jobs::CoordinatorConfig;
use featctl_infra::spec::InMemorySpecService;
use reqwest::StatusCode;
use serde_json::Value;

struct TestServer {
    base_url: String,
    specs: Arc<InMemorySpecService>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-process backends, ephemeral port.
        let specs = Arc::new(InMemorySpecService::new());
        let services = AppServices::in_process(specs.clone(), CoordinatorConfig::default()).unwrap();
        let app = featctl_api::app::build_app(Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, specs, handle }
    }

    /// One redis store subscribed to everything in `project1`, one feature set.
    async fn spawn_with_specs() -> Self {
        let server = Self::spawn().await;
        server
            .specs
            .register_store(
                Store::new(
                    "online",
                    StoreConfig::Redis {
                        host: "redis".to_string(),
                        port: 6379,
                    },
                )
                .with_subscription(Subscription::new("project1", "*")),
            )
            .unwrap();
        server
            .specs
            .register_feature_set(FeatureSetSpec::new("project1", "fs1", Source::kafka("kafka:9092", "t1")))
            .unwrap();
        server
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new().post(self.url(path)).send().await.unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new().get(self.url(path)).send().await.unwrap()
    }

    /// Run a pass and return the id of the only job.
    async fn poll_single_job(&self) -> String {
        let res = self.post("/poll").await;
        assert_eq!(res.status(), StatusCode::OK);

        let jobs: Value = self.get("/jobs").await.json().await.unwrap();
        assert_eq!(jobs.as_array().unwrap().len(), 1);
        jobs[0]["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;

    let res = server.get("/health").await;

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn no_jobs_before_the_first_pass() {
    let server = TestServer::spawn_with_specs().await;

    let res = server.get("/jobs").await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn poll_starts_a_job_per_store_and_source() {
    let server = TestServer::spawn_with_specs().await;

    let res = server.post("/poll").await;
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["stores_scanned"], 1);
    assert_eq!(report["started"], 1);
    assert_eq!(report["failures"], serde_json::json!([]));

    let jobs: Value = server.get("/jobs?store=online").await.json().await.unwrap();
    let job = &jobs[0];
    assert_eq!(job["store"], "online");
    assert_eq!(job["runner"], "DirectRunner");
    assert_eq!(job["status"], "RUNNING");
    assert_eq!(job["source"]["type"], "KAFKA");
    assert_eq!(job["feature_sets"], serde_json::json!(["project1/fs1"]));
    assert!(job["ext_id"].as_str().unwrap().starts_with("direct-"));

    // A second pass finds nothing to do.
    let report: Value = server.post("/poll").await.json().await.unwrap();
    assert_eq!(report["started"], 0);
    assert_eq!(report["unchanged"], 1);
}

#[tokio::test]
async fn list_filters_by_store_and_feature_set() {
    let server = TestServer::spawn_with_specs().await;
    server.poll_single_job().await;

    let elsewhere: Value = server.get("/jobs?store=offline").await.json().await.unwrap();
    let by_feature_set: Value = server
        .get("/jobs?feature_set=project1/fs1")
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(elsewhere, serde_json::json!([]));
    assert_eq!(by_feature_set.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_feature_set_filter_is_rejected() {
    let server = TestServer::spawn().await;

    let res = server.get("/jobs?feature_set=project1/").await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_filter");
}

#[tokio::test]
async fn get_job_by_id() {
    let server = TestServer::spawn_with_specs().await;
    let id = server.poll_single_job().await;

    let res = server.get(&format!("/jobs/{id}")).await;

    assert_eq!(res.status(), StatusCode::OK);
    let job: Value = res.json().await.unwrap();
    assert_eq!(job["id"], id.as_str());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let server = TestServer::spawn().await;

    let res = server.get("/jobs/nope").await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn blank_job_id_is_rejected() {
    let server = TestServer::spawn().await;

    let res = server.get("/jobs/%20").await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn restart_relaunches_a_running_job() {
    let server = TestServer::spawn_with_specs().await;
    let id = server.poll_single_job().await;
    let before: Value = server.get(&format!("/jobs/{id}")).await.json().await.unwrap();

    let res = server.post(&format!("/jobs/{id}/restart")).await;

    assert_eq!(res.status(), StatusCode::OK);
    let after: Value = res.json().await.unwrap();
    assert_eq!(after["id"], id.as_str());
    assert_eq!(after["status"], "RUNNING");
    assert_ne!(after["ext_id"], before["ext_id"]);
}

#[tokio::test]
async fn abort_then_restart_conflicts() {
    let server = TestServer::spawn_with_specs().await;
    let id = server.poll_single_job().await;

    let res = server.post(&format!("/jobs/{id}/abort")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let job: Value = res.json().await.unwrap();
    assert_eq!(job["status"], "ABORTING");

    let res = server.post(&format!("/jobs/{id}/restart")).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_state");
}

#[tokio::test]
async fn aborted_job_settles_on_the_next_pass() {
    let server = TestServer::spawn_with_specs().await;
    let id = server.poll_single_job().await;
    server.post(&format!("/jobs/{id}/abort")).await;

    let report: Value = server.post("/poll").await.json().await.unwrap();

    assert_eq!(report["status_changes"], 1);
    let job: Value = server.get(&format!("/jobs/{id}")).await.json().await.unwrap();
    assert_eq!(job["status"], "ABORTED");
}
