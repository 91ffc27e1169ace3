//! Scorers: turn an [`Observation`] into a [`Classification`].
//!
//! - [`RuleScorer`] -- fixed status rules per entity kind; the default.
//! - [`LogisticScorer`] -- a logistic model over numeric fields, loaded once
//!   at startup from a JSON model file.

use std::collections::BTreeMap;
use std::path::Path;

use secwatch_core::collaborators::Scorer;
use secwatch_core::entity::EntityKind;
use secwatch_core::error::ScoreError;
use secwatch_core::observation::{Classification, Label, Observation};
use serde::Deserialize;

use crate::sources::health::INCIDENTS_FIELD;

// ---------------------------------------------------------------------------
// RuleScorer
// ---------------------------------------------------------------------------

/// Intercom statuses considered healthy.
const INTERCOM_HEALTHY_STATUSES: [&str; 2] = ["active", "online"];

/// Classifies by device status:
///
/// | Kind          | Failing when                    |
/// |---------------|---------------------------------|
/// | camera        | `status == "offline"`           |
/// | door          | `access_granted == 0`           |
/// | intercom      | `status` not `active`/`online`  |
/// | health window | `incidents > 0`                 |
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleScorer;

impl RuleScorer {
    fn is_failing(observation: &Observation) -> Result<bool, ScoreError> {
        match observation.kind {
            EntityKind::Camera => Ok(required_text(observation, "status")? == "offline"),
            EntityKind::Door => Ok(required_number(observation, "access_granted")? == 0.0),
            EntityKind::Intercom => {
                let status = required_text(observation, "status")?;
                Ok(!INTERCOM_HEALTHY_STATUSES.contains(&status))
            }
            EntityKind::HealthWindow => Ok(required_number(observation, INCIDENTS_FIELD)? > 0.0),
        }
    }
}

impl Scorer for RuleScorer {
    fn name(&self) -> &'static str {
        "rule"
    }

    fn score(&self, observation: &Observation) -> Result<Classification, ScoreError> {
        let failing = Self::is_failing(observation)?;
        Ok(Classification {
            label: if failing { Label::Failing } else { Label::Healthy },
            score: if failing { 1.0 } else { 0.0 },
            scorer: self.name().to_string(),
        })
    }
}

fn required_text<'a>(observation: &'a Observation, feature: &str) -> Result<&'a str, ScoreError> {
    observation
        .text(feature)
        .ok_or_else(|| missing(observation, feature))
}

fn required_number(observation: &Observation, feature: &str) -> Result<f64, ScoreError> {
    observation
        .number(feature)
        .ok_or_else(|| missing(observation, feature))
}

fn missing(observation: &Observation, feature: &str) -> ScoreError {
    ScoreError::MissingFeature {
        entity_id: observation.entity_id.clone(),
        feature: feature.to_string(),
    }
}

// ---------------------------------------------------------------------------
// LogisticScorer
// ---------------------------------------------------------------------------

/// Error type for model loading.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse model file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid model: {0}")]
    Invalid(String),
}

fn default_threshold() -> f64 {
    0.5
}

/// Logistic-regression parameters, e.g.
///
/// ```json
/// { "weights": { "motion_detected": 0.4, "is_online": -3.1 },
///   "bias": 0.2, "threshold": 0.5, "kinds": ["camera"] }
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LogisticModel {
    /// Weight per numeric observation field.
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub bias: f64,
    /// Failure probability at or above which an observation is failing.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Entity kinds the model applies to; empty means all.
    #[serde(default)]
    pub kinds: Vec<EntityKind>,
}

impl LogisticModel {
    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_str(raw)?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.weights.is_empty() {
            return Err(ModelError::Invalid("model has no weights".into()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ModelError::Invalid(format!(
                "threshold must be between 0.0 and 1.0, got {}",
                self.threshold
            )));
        }
        if let Some((name, _)) = self.weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(ModelError::Invalid(format!("weight for '{name}' is not finite")));
        }
        Ok(())
    }

    /// Failure probability for an observation.
    pub fn probability(&self, observation: &Observation) -> Result<f64, ScoreError> {
        let mut z = self.bias;
        for (feature, weight) in &self.weights {
            z += weight * required_number(observation, feature)?;
        }
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}

/// Scores with a [`LogisticModel`] held for the process lifetime.
#[derive(Debug, Clone)]
pub struct LogisticScorer {
    model: LogisticModel,
}

impl LogisticScorer {
    pub fn new(model: LogisticModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &LogisticModel {
        &self.model
    }
}

impl Scorer for LogisticScorer {
    fn name(&self) -> &'static str {
        "logistic"
    }

    fn score(&self, observation: &Observation) -> Result<Classification, ScoreError> {
        if !self.model.kinds.is_empty() && !self.model.kinds.contains(&observation.kind) {
            return Err(ScoreError::UnsupportedKind {
                scorer: self.name(),
                kind: observation.kind.to_string(),
            });
        }

        let probability = self.model.probability(observation)?;
        let label = if probability >= self.model.threshold {
            Label::Failing
        } else {
            Label::Healthy
        };

        Ok(Classification {
            label,
            score: probability,
            scorer: self.name().to_string(),
        })
    }
}
