//! Repository for the `observations` table (append-only time-series).

use secwatch_core::entity::EntityKind;
use secwatch_core::observation::Observation;
use secwatch_core::types::Timestamp;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use super::{values_placeholders, INSERT_CHUNK_SIZE};
use crate::models::observation::{EntityIncidentCount, ObservationRow};

/// Column list for `observations` SELECT queries.
const COLUMNS: &str = "id, entity_id, entity_kind, cycle, observed_at, fields, created_at";

/// Column list for INSERT statements (excludes generated `id` and `created_at`).
const INSERT_COLUMNS: &str = "entity_id, entity_kind, cycle, observed_at, fields";

const INSERT_COLUMN_COUNT: usize = 5;

/// Provides query operations for device observations.
pub struct ObservationRepo;

impl ObservationRepo {
    /// Batch-insert observations, skipping rows already stored for the same
    /// `(entity_id, observed_at)`. Returns the number of newly inserted rows.
    ///
    /// Replaying a batch after a failed commit is therefore harmless.
    pub async fn insert_batch(
        conn: &mut PgConnection,
        observations: &[Observation],
    ) -> Result<u64, sqlx::Error> {
        let mut inserted = 0u64;

        for chunk in observations.chunks(INSERT_CHUNK_SIZE) {
            let query = format!(
                "INSERT INTO observations ({INSERT_COLUMNS}) VALUES {} \
                 ON CONFLICT (entity_id, observed_at) DO NOTHING",
                values_placeholders(chunk.len(), INSERT_COLUMN_COUNT)
            );

            let mut q = sqlx::query(&query);
            for obs in chunk {
                q = q
                    .bind(&obs.entity_id)
                    .bind(obs.kind.as_str())
                    .bind(obs.cycle as i64)
                    .bind(obs.observed_at)
                    .bind(Json(&obs.fields));
            }

            inserted += q.execute(&mut *conn).await?.rows_affected();
        }

        Ok(inserted)
    }

    /// Observations of one kind recorded at or after `since`, newest first.
    pub async fn list_since(
        pool: &PgPool,
        kind: EntityKind,
        since: Timestamp,
    ) -> Result<Vec<ObservationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM observations \
             WHERE entity_kind = $1 AND observed_at >= $2 \
             ORDER BY observed_at DESC"
        );
        sqlx::query_as::<_, ObservationRow>(&query)
            .bind(kind.as_str())
            .bind(since)
            .fetch_all(pool)
            .await
    }

    /// Cameras reported offline at or after `since`, with the number of
    /// offline readings per camera.
    pub async fn offline_cameras_since(
        pool: &PgPool,
        since: Timestamp,
    ) -> Result<Vec<EntityIncidentCount>, sqlx::Error> {
        sqlx::query_as::<_, EntityIncidentCount>(
            "SELECT entity_id, COUNT(*) AS incidents FROM observations \
             WHERE entity_kind = $1 \
               AND fields->>'status' = 'offline' \
               AND observed_at >= $2 \
             GROUP BY entity_id \
             ORDER BY entity_id",
        )
        .bind(EntityKind::Camera.as_str())
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Doors that denied access at or after `since`, with the number of
    /// denied readings per door.
    pub async fn access_failures_since(
        pool: &PgPool,
        since: Timestamp,
    ) -> Result<Vec<EntityIncidentCount>, sqlx::Error> {
        sqlx::query_as::<_, EntityIncidentCount>(
            "SELECT entity_id, COUNT(*) AS incidents FROM observations \
             WHERE entity_kind = $1 \
               AND fields->>'access_granted' IN ('0', 'false') \
               AND observed_at >= $2 \
             GROUP BY entity_id \
             ORDER BY entity_id",
        )
        .bind(EntityKind::Door.as_str())
        .bind(since)
        .fetch_all(pool)
        .await
    }
}
