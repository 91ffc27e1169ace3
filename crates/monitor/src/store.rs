//! Postgres-backed [`ObservationStore`].

use async_trait::async_trait;
use secwatch_core::collaborators::ObservationStore;
use secwatch_core::error::StorageError;
use secwatch_core::observation::CycleBatch;
use secwatch_db::repositories::{ObservationRepo, PredictionRepo};
use secwatch_db::DbPool;

/// Appends each cycle batch in a single transaction.
///
/// Rows conflicting on `(entity_id, observed_at)` are skipped, so a batch
/// replayed after a failed attempt never duplicates committed records.
#[derive(Debug, Clone)]
pub struct PgObservationStore {
    pool: DbPool,
}

impl PgObservationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn append_tx(&self, batch: &CycleBatch) -> Result<(u64, u64), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let observations = ObservationRepo::insert_batch(&mut *tx, &batch.observations).await?;
        let predictions = PredictionRepo::insert_batch(&mut *tx, &batch.scored).await?;
        tx.commit().await?;
        Ok((observations, predictions))
    }
}

#[async_trait]
impl ObservationStore for PgObservationStore {
    async fn append(&self, batch: &CycleBatch) -> Result<(), StorageError> {
        let (observations, predictions) = self.append_tx(batch).await.map_err(storage_error)?;

        tracing::debug!(
            cycle = batch.cycle,
            observations,
            predictions,
            skipped = ((batch.observations.len() + batch.scored.len()) as u64)
                .saturating_sub(observations + predictions),
            "Cycle batch stored",
        );
        Ok(())
    }
}

/// Classify an sqlx failure: connectivity problems versus rejected writes.
pub fn storage_error(error: sqlx::Error) -> StorageError {
    match error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Connection(error.to_string()),
        other => StorageError::Write(other.to_string()),
    }
}
