//! `secwatch-monitor` -- scheduled poll / score / alert loop.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod context;
pub mod metrics;
pub mod scheduler;
pub mod scoring;
pub mod server;
pub mod sources;
pub mod store;
