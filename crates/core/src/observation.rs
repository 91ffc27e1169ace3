//! Observation records produced and consumed by one monitor cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::types::{CycleId, EntityId, Timestamp};

/// A scalar status field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view used by feature-based scorers. Booleans map to 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON scalar. Arrays, objects and nulls are rejected.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One reading from one entity at one instant, collected in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub cycle: CycleId,
    pub observed_at: Timestamp,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Observation {
    pub fn new(entity_id: impl Into<EntityId>, kind: EntityKind, cycle: CycleId) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind,
            cycle,
            observed_at: chrono::Utc::now(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter used while the observation is constructed.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(FieldValue::as_str)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.field(key).and_then(FieldValue::as_f64)
    }
}

/// Outcome label of a scoring step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Healthy,
    Failing,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Failing => "failing",
        }
    }
}

/// A scorer's verdict for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    /// Failure likelihood in `[0.0, 1.0]`.
    pub score: f64,
    /// Name of the scorer that produced this classification.
    pub scorer: String,
}

impl Classification {
    pub fn is_failing(&self) -> bool {
        self.label == Label::Failing
    }
}

/// An observation annotated with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredObservation {
    pub observation: Observation,
    pub classification: Classification,
}

impl ScoredObservation {
    pub fn is_failing(&self) -> bool {
        self.classification.is_failing()
    }

    pub fn entity_id(&self) -> &str {
        &self.observation.entity_id
    }
}

/// Everything one cycle hands to the persistence sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleBatch {
    pub cycle: CycleId,
    pub observations: Vec<Observation>,
    pub scored: Vec<ScoredObservation>,
}

impl CycleBatch {
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty() && self.scored.is_empty()
    }
}
