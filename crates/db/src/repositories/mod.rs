//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Writes take a `&mut PgConnection` so callers can group them in one
//! transaction; reads accept `&PgPool`.

pub mod observation_repo;
pub mod prediction_repo;

pub use observation_repo::ObservationRepo;
pub use prediction_repo::PredictionRepo;

/// Rows per multi-row INSERT statement.
pub const INSERT_CHUNK_SIZE: usize = 50;

/// Build `($1, $2, ..), ($n, ..)` placeholders for a multi-row VALUES clause.
pub(crate) fn values_placeholders(rows: usize, columns: usize) -> String {
    let mut out = String::with_capacity(rows * columns * 4);
    let mut param_idx = 1usize;
    for row in 0..rows {
        if row > 0 {
            out.push_str(", ");
        }
        out.push('(');
        for col in 0..columns {
            if col > 0 {
                out.push_str(", ");
            }
            out.push('$');
            out.push_str(&param_idx.to_string());
            param_idx += 1;
        }
        out.push(')');
    }
    out
}
