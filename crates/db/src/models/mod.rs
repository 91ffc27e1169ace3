//! Row models for the monitoring tables.

pub mod observation;

pub use observation::{EntityIncidentCount, ObservationRow, PredictionRow};
