//! [`DataSource`](secwatch_core::collaborators::DataSource) implementations.
//!
//! - [`http`] -- device status endpoints, one GET per entity.
//! - [`health`] -- trailing-window failure counts over stored observations.

pub mod health;
pub mod http;

pub use health::HealthWindowSource;
pub use http::HttpDeviceSource;
