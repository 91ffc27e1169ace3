//! Log-only alert channel.

use async_trait::async_trait;
use secwatch_core::alert::AlertEvent;
use secwatch_core::collaborators::Notifier;
use secwatch_core::error::DeliveryError;

/// Writes alerts to the log at `WARN`. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDelivery;

#[async_trait]
impl Notifier for LogDelivery {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn send(&self, alert: &AlertEvent) -> Result<(), DeliveryError> {
        tracing::warn!(
            cycle = alert.cycle,
            entities = ?alert.entity_ids,
            reason = %alert.reason,
            "{}",
            alert.subject,
        );
        Ok(())
    }
}
