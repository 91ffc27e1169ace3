//! Repository for the `predictions` table (append-only).

use secwatch_core::observation::ScoredObservation;
use secwatch_core::types::Timestamp;
use sqlx::{PgConnection, PgPool};

use super::{values_placeholders, INSERT_CHUNK_SIZE};
use crate::models::observation::PredictionRow;

const COLUMNS: &str =
    "id, entity_id, entity_kind, cycle, observed_at, label, score, scorer, created_at";

const INSERT_COLUMNS: &str = "entity_id, entity_kind, cycle, observed_at, label, score, scorer";

const INSERT_COLUMN_COUNT: usize = 7;

/// Provides query operations for scorer verdicts.
pub struct PredictionRepo;

impl PredictionRepo {
    /// Batch-insert scored observations; duplicates by
    /// `(entity_id, observed_at)` are skipped. Returns rows inserted.
    pub async fn insert_batch(
        conn: &mut PgConnection,
        scored: &[ScoredObservation],
    ) -> Result<u64, sqlx::Error> {
        let mut inserted = 0u64;

        for chunk in scored.chunks(INSERT_CHUNK_SIZE) {
            let query = format!(
                "INSERT INTO predictions ({INSERT_COLUMNS}) VALUES {} \
                 ON CONFLICT (entity_id, observed_at) DO NOTHING",
                values_placeholders(chunk.len(), INSERT_COLUMN_COUNT)
            );

            let mut q = sqlx::query(&query);
            for s in chunk {
                q = q
                    .bind(&s.observation.entity_id)
                    .bind(s.observation.kind.as_str())
                    .bind(s.observation.cycle as i64)
                    .bind(s.observation.observed_at)
                    .bind(s.classification.label.as_str())
                    .bind(s.classification.score)
                    .bind(&s.classification.scorer);
            }

            inserted += q.execute(&mut *conn).await?.rows_affected();
        }

        Ok(inserted)
    }

    /// Predictions recorded at or after `since`, oldest first.
    pub async fn list_since(
        pool: &PgPool,
        since: Timestamp,
    ) -> Result<Vec<PredictionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM predictions \
             WHERE observed_at >= $1 \
             ORDER BY observed_at ASC"
        );
        sqlx::query_as::<_, PredictionRow>(&query)
            .bind(since)
            .fetch_all(pool)
            .await
    }
}
