//! Health-check mode: failure counts over a trailing window of stored
//! observations.
//!
//! Two logical entities are polled each cycle. `cctv_offline` counts
//! offline camera readings and `access_failures` counts denied door
//! readings, both within the last [`HealthWindowSource::window`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use secwatch_core::collaborators::DataSource;
use secwatch_core::entity::EntityKind;
use secwatch_core::error::{CoreError, FetchError};
use secwatch_core::metric_names;
use secwatch_core::observation::{FieldValue, Observation};
use secwatch_core::types::CycleId;
use secwatch_db::models::EntityIncidentCount;
use secwatch_db::repositories::ObservationRepo;
use secwatch_db::DbPool;

pub const CCTV_OFFLINE_ENTITY: &str = "cctv_offline";
pub const ACCESS_FAILURES_ENTITY: &str = "access_failures";

/// The fixed entity set of health-check mode.
pub const HEALTH_ENTITIES: [&str; 2] = [CCTV_OFFLINE_ENTITY, ACCESS_FAILURES_ENTITY];

/// Total matching readings in the window.
pub const INCIDENTS_FIELD: &str = "incidents";
/// Distinct devices with at least one matching reading.
pub const ENTITIES_FIELD: &str = "entities";
/// Comma-separated ids of those devices.
pub const ENTITY_IDS_FIELD: &str = "entity_ids";

/// Gauge that mirrors the distinct-device count of a health entity.
pub fn gauge_for(entity_id: &str) -> Option<&'static str> {
    match entity_id {
        CCTV_OFFLINE_ENTITY => Some(metric_names::CCTV_OFFLINE),
        ACCESS_FAILURES_ENTITY => Some(metric_names::ACCESS_CONTROL_FAILURES),
        _ => None,
    }
}

pub struct HealthWindowSource {
    pool: DbPool,
    window: TimeDelta,
}

impl HealthWindowSource {
    pub fn new(pool: DbPool, window: Duration) -> Result<Self, CoreError> {
        let window = TimeDelta::from_std(window)
            .map_err(|e| CoreError::Validation(format!("health window out of range: {e}")))?;
        Ok(Self { pool, window })
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }
}

#[async_trait]
impl DataSource for HealthWindowSource {
    async fn fetch(&self, entity_id: &str, cycle: CycleId) -> Result<Observation, FetchError> {
        let since = Utc::now() - self.window;

        let counts = match entity_id {
            CCTV_OFFLINE_ENTITY => ObservationRepo::offline_cameras_since(&self.pool, since).await,
            ACCESS_FAILURES_ENTITY => ObservationRepo::access_failures_since(&self.pool, since).await,
            other => {
                return Err(FetchError::Malformed {
                    entity_id: other.to_string(),
                    reason: "unknown health window".into(),
                })
            }
        }
        .map_err(|e| FetchError::Transport {
            entity_id: entity_id.to_string(),
            reason: e.to_string(),
        })?;

        Ok(window_observation(entity_id, cycle, &counts))
    }
}

/// Summarise per-device counts into one health observation.
pub fn window_observation(entity_id: &str, cycle: CycleId, counts: &[EntityIncidentCount]) -> Observation {
    let incidents: i64 = counts.iter().map(|c| c.incidents).sum();
    let ids = counts
        .iter()
        .map(|c| c.entity_id.as_str())
        .collect::<Vec<_>>()
        .join(",");

    Observation::new(entity_id, EntityKind::HealthWindow, cycle)
        .with_field(INCIDENTS_FIELD, incidents)
        .with_field(ENTITIES_FIELD, counts.len() as i64)
        .with_field(ENTITY_IDS_FIELD, FieldValue::Text(ids))
}
