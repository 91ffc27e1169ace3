//! Monitored entity kinds.
//!
//! Device fleets (cameras, doors, intercoms) are polled over HTTP; the
//! [`EntityKind::HealthWindow`] kind names logical data sources that are
//! evaluated against the stored readings instead of a device endpoint.

use serde::{Deserialize, Serialize};

use crate::types::EntityId;

/// The kind of entity an observation was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Camera,
    Door,
    Intercom,
    HealthWindow,
}

impl EntityKind {
    /// Canonical lowercase name, stored in the `entity_kind` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Door => "door",
            Self::Intercom => "intercom",
            Self::HealthWindow => "health_window",
        }
    }

    /// Id prefix for generated fleet ids (`CAM_001`, `DOOR_001`, ...).
    ///
    /// Logical health windows have fixed names and no prefix.
    pub fn id_prefix(self) -> Option<&'static str> {
        match self {
            Self::Camera => Some("CAM"),
            Self::Door => Some("DOOR"),
            Self::Intercom => Some("INT"),
            Self::HealthWindow => None,
        }
    }

    /// Infer the kind from an entity id prefix.
    pub fn from_entity_id(entity_id: &str) -> Option<Self> {
        let prefix = entity_id.split('_').next()?;
        [Self::Camera, Self::Door, Self::Intercom]
            .into_iter()
            .find(|kind| kind.id_prefix() == Some(prefix))
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate `count` zero-padded fleet ids for a device kind.
///
/// Returns an empty list for kinds without an id prefix.
pub fn fleet_ids(kind: EntityKind, count: usize) -> Vec<EntityId> {
    match kind.id_prefix() {
        Some(prefix) => (1..=count).map(|i| format!("{prefix}_{i:03}")).collect(),
        None => Vec::new(),
    }
}
