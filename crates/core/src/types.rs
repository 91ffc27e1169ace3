/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Monitored entity identifier, e.g. `CAM_001`.
pub type EntityId = String;

/// Monotonic collection cycle number, starting at 1.
pub type CycleId = u64;
