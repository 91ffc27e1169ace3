//! External delivery channels for alert events.

pub mod email;
pub mod log;
pub mod webhook;
