//! Alert notification channels.
//!
//! - [`EmailDelivery`] -- SMTP (STARTTLS) via `lettre`.
//! - [`WebhookDelivery`] -- JSON POST via `reqwest`.
//! - [`LogDelivery`] -- writes the alert to the log only; used when no
//!   external channel is configured.
//!
//! Every channel implements [`secwatch_core::collaborators::Notifier`] and
//! performs a single attempt per call. Retrying is the caller's decision.

pub mod delivery;

pub use delivery::email::{AlertEnvelope, EmailConfig, EmailDelivery, EmailError};
pub use delivery::log::LogDelivery;
pub use delivery::webhook::{WebhookDelivery, WebhookError};
