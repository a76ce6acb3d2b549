//! Wire types of the Databricks Jobs API 2.0.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CreateRequest {
    pub name: String,
    pub new_cluster: NewCluster,
    pub libraries: Vec<Library>,
    pub spark_jar_task: SparkJarTask,
    pub max_retries: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCluster {
    pub num_workers: u32,
    pub spark_version: String,
    pub node_type_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Library {
    pub jar: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SparkJarTask {
    pub main_class_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResponse {
    #[serde(deserialize_with = "numeric_id")]
    pub job_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunNowRequest {
    pub job_id: i64,
    pub jar_params: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunNowResponse {
    #[serde(deserialize_with = "numeric_id")]
    pub run_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelRunRequest {
    pub run_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunResponse {
    pub state: RunState,
}

/// Two-part run state: life-cycle phase plus, once terminal, the outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct RunState {
    pub life_cycle_state: String,
    #[serde(default)]
    pub result_state: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Str(String),
}

/// Ids come back as numbers from the real service and as strings from some proxies.
fn numeric_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match IdRepr::deserialize(deserializer)? {
        IdRepr::Int(id) => Ok(id),
        IdRepr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
