//! `secwatch-core` -- domain records and policies shared by every crate.
//!
//! - [`observation`] -- observations, classifications and cycle batches.
//! - [`entity`] -- monitored entity kinds and fleet id generation.
//! - [`alert`] -- the alert predicate and [`alert::AlertEvent`].
//! - [`retry`] -- explicit exponential-backoff retry policy.
//! - [`collaborators`] -- the traits the monitor loop orchestrates.

pub mod alert;
pub mod collaborators;
pub mod entity;
pub mod error;
pub mod metric_names;
pub mod observation;
pub mod retry;
pub mod types;
