//! Upstream data feeds an ingestion job reads from.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Namespace for source fingerprints (stable across processes and releases).
const SOURCE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_3b2e_9a47_4d1e_8c55_2b7e_0f3a_91d4);

/// Kind of upstream feed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Kafka,
    Kinesis,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Kafka => "kafka",
            SourceType::Kinesis => "kinesis",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KafkaSourceConfig {
    pub bootstrap_servers: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KinesisSourceConfig {
    pub region: String,
    pub stream_name: String,
}

/// An upstream feed.
///
/// Equality is structural: two sources with identical fields are the same
/// source, regardless of which feature set declared them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Kafka(KafkaSourceConfig),
    Kinesis(KinesisSourceConfig),
}

impl Source {
    pub fn kafka(bootstrap_servers: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::Kafka(KafkaSourceConfig {
            bootstrap_servers: bootstrap_servers.into(),
            topic: topic.into(),
        })
    }

    pub fn kinesis(region: impl Into<String>, stream_name: impl Into<String>) -> Self {
        Self::Kinesis(KinesisSourceConfig {
            region: region.into(),
            stream_name: stream_name.into(),
        })
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Source::Kafka(_) => SourceType::Kafka,
            Source::Kinesis(_) => SourceType::Kinesis,
        }
    }

    /// Canonical `type:endpoint:feed` key.
    pub fn key(&self) -> String {
        match self {
            Source::Kafka(c) => format!("kafka:{}:{}", c.bootstrap_servers, c.topic),
            Source::Kinesis(c) => format!("kinesis:{}:{}", c.region, c.stream_name),
        }
    }

    /// Short deterministic fingerprint of [`Source::key`], used in job ids.
    pub fn fingerprint(&self) -> String {
        let uuid = Uuid::new_v5(&SOURCE_NAMESPACE, self.key().as_bytes());
        uuid.simple().to_string()[..8].to_string()
    }

    pub fn validate(&self) -> DomainResult<()> {
        match self {
            Source::Kafka(c) => {
                if c.bootstrap_servers.trim().is_empty() {
                    return Err(DomainError::validation("kafka source has no bootstrap servers"));
                }
                if c.topic.trim().is_empty() {
                    return Err(DomainError::validation("kafka source has no topic"));
                }
            }
            Source::Kinesis(c) => {
                if c.region.trim().is_empty() || c.stream_name.trim().is_empty() {
                    return Err(DomainError::validation(
                        "kinesis source needs a region and a stream name",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Decode and validate a JSON source payload.
    pub fn from_json(json: &str) -> DomainResult<Self> {
        let source: Source = serde_json::from_str(json)?;
        source.validate()?;
        Ok(source)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
