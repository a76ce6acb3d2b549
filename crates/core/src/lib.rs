//! `featctl-core`: domain building blocks of the ingestion-job control plane.
//!
//! This crate contains **pure domain** types (no infrastructure concerns): the
//! source/store value objects, feature-set specs, subscription matching and the
//! job entity with its status state machine.

pub mod error;
pub mod feature_set;
pub mod id;
pub mod job;
pub mod source;
pub mod store;
pub mod subscription;

pub use error::{DomainError, DomainResult};
pub use feature_set::{FeatureSetRef, FeatureSetSpec, FieldKind, FieldSpec, ValueType};
pub use id::JobId;
pub use job::{Job, JobStatus, Runner};
pub use source::{KafkaSourceConfig, KinesisSourceConfig, Source, SourceType};
pub use store::{Store, StoreConfig, StoreType};
pub use subscription::{Subscription, SubscriptionMatcher, matches};
