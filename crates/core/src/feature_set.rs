//! Feature-set specs as published by the spec service (read-only here).

use core::fmt;
use core::str::FromStr;
use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::source::Source;

/// Project assumed when a reference carries no `project/` prefix.
pub const DEFAULT_PROJECT: &str = "default";

/// `project/name` reference to a feature set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FeatureSetRef {
    pub project: String,
    pub name: String,
}

impl FeatureSetRef {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FeatureSetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.name)
    }
}

impl FromStr for FeatureSetRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (project, name) = match s.split_once('/') {
            Some((project, name)) => (project, name),
            None => (DEFAULT_PROJECT, s),
        };
        if project.is_empty() || name.is_empty() {
            return Err(DomainError::invalid_id(format!("feature set reference: {s:?}")));
        }
        Ok(Self::new(project, name))
    }
}

impl From<FeatureSetRef> for String {
    fn from(value: FeatureSetRef) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for FeatureSetRef {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Bytes,
    String,
    Int32,
    Int64,
    Double,
    Float,
    Bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Entity,
    Feature,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub value_type: ValueType,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn entity(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            kind: FieldKind::Entity,
        }
    }

    pub fn feature(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            kind: FieldKind::Feature,
        }
    }
}

/// A feature set: what gets ingested, from which source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureSetSpec {
    #[serde(default = "default_project")]
    pub project: String,
    pub name: String,
    pub source: Source,
    /// Max staleness of served values, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

impl FeatureSetSpec {
    pub fn new(project: impl Into<String>, name: impl Into<String>, source: Source) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            source,
            max_age_secs: None,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age_secs = Some(max_age.as_secs());
        self
    }

    pub fn reference(&self) -> FeatureSetRef {
        FeatureSetRef::new(self.project.clone(), self.name.clone())
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_secs.map(Duration::from_secs)
    }

    pub fn fields_by_name(&self) -> HashMap<&str, &FieldSpec> {
        self.fields.iter().map(|f| (f.name.as_str(), f)).collect()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.project.is_empty() || self.name.is_empty() {
            return Err(DomainError::validation(format!(
                "feature set needs a project and a name: {}",
                self.reference()
            )));
        }
        if self.fields_by_name().len() != self.fields.len() {
            return Err(DomainError::validation(format!(
                "feature set {} declares a field name twice",
                self.reference()
            )));
        }
        self.source.validate()
    }

    /// Decode and validate a JSON feature-set payload.
    pub fn from_json(json: &str) -> DomainResult<Self> {
        let spec: FeatureSetSpec = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }
}
