//! Device status polling over HTTP.
//!
//! Each entity maps to one JSON status endpoint under the configured base
//! URL:
//!
//! | Kind     | Endpoint                              |
//! |----------|---------------------------------------|
//! | camera   | `GET {base}/cameras/{id}/status`        |
//! | door     | `GET {base}/access-control/{id}/status` |
//! | intercom | `GET {base}/intercoms/{id}/status`      |
//!
//! Fields the device omits fall back to pessimistic defaults, so a camera
//! that does not report a status is treated as offline.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use secwatch_core::collaborators::DataSource;
use secwatch_core::entity::EntityKind;
use secwatch_core::error::FetchError;
use secwatch_core::observation::{FieldValue, Observation};
use secwatch_core::types::CycleId;

/// Device-supplied reading time; used as `observed_at` when present.
const TIMESTAMP_FIELD: &str = "timestamp";

/// Polls the device status API.
#[derive(Debug, Clone)]
pub struct HttpDeviceSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpDeviceSource {
    /// Build a source with a shared HTTP client whose request timeout
    /// matches the per-fetch timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn status_url(&self, kind: EntityKind, entity_id: &str) -> Option<String> {
        let collection = match kind {
            EntityKind::Camera => "cameras",
            EntityKind::Door => "access-control",
            EntityKind::Intercom => "intercoms",
            EntityKind::HealthWindow => return None,
        };
        Some(format!("{}/{collection}/{entity_id}/status", self.base_url))
    }

    fn transport_error(&self, entity_id: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                entity_id: entity_id.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Transport {
                entity_id: entity_id.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl DataSource for HttpDeviceSource {
    async fn fetch(&self, entity_id: &str, cycle: CycleId) -> Result<Observation, FetchError> {
        let kind = EntityKind::from_entity_id(entity_id).ok_or_else(|| FetchError::Malformed {
            entity_id: entity_id.to_string(),
            reason: "entity id has no known device prefix".into(),
        })?;
        let url = self
            .status_url(kind, entity_id)
            .ok_or_else(|| FetchError::Malformed {
                entity_id: entity_id.to_string(),
                reason: format!("{kind} entities have no status endpoint"),
            })?;

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(entity_id, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                entity_id: entity_id.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(entity_id, e))?;
        let payload: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::Malformed {
                entity_id: entity_id.to_string(),
                reason: e.to_string(),
            })?;

        parse_status(entity_id, kind, cycle, &payload)
    }
}

/// Turn a device status payload into an [`Observation`].
///
/// Scalar fields are copied as-is; nested values and nulls are dropped.
/// Defaults fill in the fields each kind is scored on, then derived
/// `is_online` and `hour_of_day` features are added.
pub fn parse_status(
    entity_id: &str,
    kind: EntityKind,
    cycle: CycleId,
    payload: &serde_json::Value,
) -> Result<Observation, FetchError> {
    let object = payload.as_object().ok_or_else(|| FetchError::Malformed {
        entity_id: entity_id.to_string(),
        reason: "status payload is not a JSON object".into(),
    })?;

    let mut observation = Observation::new(entity_id, kind, cycle);

    if let Some(raw) = object.get(TIMESTAMP_FIELD).and_then(|v| v.as_str()) {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => observation.observed_at = ts.with_timezone(&Utc),
            Err(e) => {
                tracing::debug!(entity_id, error = %e, "Ignoring unparseable device timestamp");
            }
        }
    }

    for (key, value) in object {
        if key == TIMESTAMP_FIELD {
            continue;
        }
        if let Some(field) = FieldValue::from_json(value) {
            observation.fields.insert(key.clone(), field);
        }
    }

    for (key, default) in defaults(kind) {
        observation
            .fields
            .entry(key.to_string())
            .or_insert(default);
    }

    let is_online = match kind {
        EntityKind::Camera => Some(observation.text("status") == Some("online")),
        EntityKind::Intercom => Some(matches!(observation.text("status"), Some("active" | "online"))),
        EntityKind::Door | EntityKind::HealthWindow => None,
    };
    if let Some(is_online) = is_online {
        observation.fields.insert("is_online".into(), FieldValue::Bool(is_online));
    }
    let hour = i64::from(observation.observed_at.hour());
    observation.fields.insert("hour_of_day".into(), FieldValue::Int(hour));

    Ok(observation)
}

fn defaults(kind: EntityKind) -> Vec<(&'static str, FieldValue)> {
    match kind {
        EntityKind::Camera => vec![
            ("status", FieldValue::from("offline")),
            ("motion_detected", FieldValue::Int(0)),
        ],
        EntityKind::Door => vec![("access_granted", FieldValue::Int(0))],
        EntityKind::Intercom => vec![("status", FieldValue::from("inactive"))],
        EntityKind::HealthWindow => Vec::new(),
    }
}
