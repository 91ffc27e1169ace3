//! Observation and prediction row models.

use secwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Observations (append-only)
// ---------------------------------------------------------------------------

/// A stored device reading.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ObservationRow {
    pub id: DbId,
    pub entity_id: String,
    pub entity_kind: String,
    pub cycle: i64,
    pub observed_at: Timestamp,
    pub fields: serde_json::Value,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Predictions (append-only)
// ---------------------------------------------------------------------------

/// A stored scorer verdict.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PredictionRow {
    pub id: DbId,
    pub entity_id: String,
    pub entity_kind: String,
    pub cycle: i64,
    pub observed_at: Timestamp,
    pub label: String,
    pub score: f64,
    pub scorer: String,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Health window aggregates
// ---------------------------------------------------------------------------

/// Number of matching rows for one entity inside a trailing window.
#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct EntityIncidentCount {
    pub entity_id: String,
    pub incidents: i64,
}
