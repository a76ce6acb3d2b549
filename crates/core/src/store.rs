//! Sink configurations (stores) and their subscriptions.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::subscription::{self, Subscription};

/// Type tag selecting which serving backend reads the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreType {
    Redis,
    RedisCluster,
    Bigquery,
    File,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Redis => "REDIS",
            StoreType::RedisCluster => "REDIS_CLUSTER",
            StoreType::Bigquery => "BIGQUERY",
            StoreType::File => "FILE",
        }
    }

    /// Whether rows reach this store through a streaming ingestion job.
    ///
    /// Purely offline stores are populated by batch exports and get the no-op
    /// backend instead.
    pub fn requires_streaming_ingestion(&self) -> bool {
        !matches!(self, StoreType::File)
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-specific connection config; the variant doubles as the type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreConfig {
    Redis { host: String, port: u16 },
    RedisCluster { connection_string: String },
    Bigquery { project_id: String, dataset_id: String },
    File { path: String },
}

/// A named sink plus the subscriptions selecting what it ingests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Store {
    pub name: String,
    pub config: StoreConfig,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl Store {
    pub fn new(name: impl Into<String>, config: StoreConfig) -> Self {
        Self {
            name: name.into(),
            config,
            subscriptions: Vec::new(),
        }
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn store_type(&self) -> StoreType {
        match self.config {
            StoreConfig::Redis { .. } => StoreType::Redis,
            StoreConfig::RedisCluster { .. } => StoreType::RedisCluster,
            StoreConfig::Bigquery { .. } => StoreType::Bigquery,
            StoreConfig::File { .. } => StoreType::File,
        }
    }

    /// Whether a feature set belongs to this store.
    pub fn is_subscribed_to(&self, project: &str, feature_set: &str) -> DomainResult<bool> {
        subscription::matches(&self.subscriptions, project, feature_set)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("store name must not be empty"));
        }
        subscription::validate_all(&self.subscriptions)
    }

    /// Decode and validate a JSON store payload.
    pub fn from_json(json: &str) -> DomainResult<Self> {
        let store: Store = serde_json::from_str(json)?;
        store.validate()?;
        Ok(store)
    }

    /// Decode a list of JSON store payloads, failing on the first bad one.
    pub fn list_from_json<I, S>(payloads: I) -> DomainResult<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        payloads
            .into_iter()
            .map(|json| Self::from_json(json.as_ref()))
            .collect()
    }
}
