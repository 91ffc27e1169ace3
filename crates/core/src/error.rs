//! Error types for every collaborator boundary of the monitor loop.

use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single entity fetch failed. The entity is dropped for the cycle.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Fetch of {entity_id} timed out after {timeout_secs}s")]
    Timeout { entity_id: EntityId, timeout_secs: u64 },

    #[error("Fetch of {entity_id} returned HTTP {status}")]
    BadStatus { entity_id: EntityId, status: u16 },

    #[error("Malformed payload for {entity_id}: {reason}")]
    Malformed { entity_id: EntityId, reason: String },

    #[error("Transport error for {entity_id}: {reason}")]
    Transport { entity_id: EntityId, reason: String },
}

/// The persistence sink could not append a batch.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage connection failed: {0}")]
    Connection(String),

    #[error("Storage write failed: {0}")]
    Write(String),
}

/// The notification sink could not deliver an alert.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Alert delivery failed on {channel}: {reason}")]
    Channel { channel: &'static str, reason: String },
}

/// Scoring one observation failed. Treated as "no classification".
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("Observation {entity_id} lacks numeric feature '{feature}'")]
    MissingFeature { entity_id: EntityId, feature: String },

    #[error("Scorer '{scorer}' cannot classify entity kind '{kind}'")]
    UnsupportedKind { scorer: &'static str, kind: String },
}
