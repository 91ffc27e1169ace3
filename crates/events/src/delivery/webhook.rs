//! Alert delivery to an HTTP webhook.
//!
//! [`WebhookDelivery`] POSTs a JSON-encoded [`AlertEvent`] to a configured
//! URL. Each call is one attempt; the monitor wraps it in its retry policy.

use std::time::Duration;

use async_trait::async_trait;
use secwatch_core::alert::AlertEvent;
use secwatch_core::collaborators::Notifier;
use secwatch_core::error::DeliveryError;

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers alert events to one webhook endpoint.
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: String,
}

impl WebhookDelivery {
    /// Create a delivery service with a pre-configured HTTP client.
    pub fn new(url: impl Into<String>) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Execute a single POST request and check the response status.
    pub async fn deliver(&self, alert: &AlertEvent) -> Result<(), WebhookError> {
        let payload = serde_json::json!({
            "event_type": "secwatch.alert",
            "cycle": alert.cycle,
            "reason": alert.reason,
            "entity_ids": alert.entity_ids,
            "raised_at": alert.raised_at,
            "subject": alert.subject,
            "body": alert.body,
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }

        tracing::info!(url = %self.url, cycle = alert.cycle, "Alert webhook delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookDelivery {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, alert: &AlertEvent) -> Result<(), DeliveryError> {
        self.deliver(alert).await.map_err(|e| DeliveryError::Channel {
            channel: "webhook",
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;

    type Received = Arc<Mutex<Vec<serde_json::Value>>>;

    fn alert() -> AlertEvent {
        AlertEvent {
            cycle: 3,
            reason: "1 of 2 entities failing (threshold: 1)".into(),
            entity_ids: vec!["DOOR_004".into()],
            raised_at: chrono::Utc::now(),
            subject: "Security system failure alert: 1 entity failing".into(),
            body: "ALERT".into(),
        }
    }

    /// Serve `status` on `POST /hook` and record the received bodies.
    async fn spawn_receiver(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::default();

        let app = Router::new()
            .route(
                "/hook",
                post(
                    move |State(received): State<Received>, Json(body): Json<serde_json::Value>| async move {
                        received.lock().unwrap().push(body);
                        status
                    },
                ),
            )
            .with_state(Arc::clone(&received));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/hook"), received)
    }

    #[tokio::test]
    async fn delivers_alert_as_json() {
        let (url, received) = spawn_receiver(StatusCode::OK).await;
        let delivery = WebhookDelivery::new(url).unwrap();

        delivery.send(&alert()).await.unwrap();

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["cycle"], 3);
        assert_eq!(bodies[0]["entity_ids"][0], "DOOR_004");
        assert_eq!(bodies[0]["event_type"], "secwatch.alert");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (url, _received) = spawn_receiver(StatusCode::BAD_GATEWAY).await;
        let delivery = WebhookDelivery::new(url).unwrap();

        assert_matches!(delivery.deliver(&alert()).await, Err(WebhookError::HttpStatus(502)));
        assert_matches!(
            delivery.send(&alert()).await,
            Err(DeliveryError::Channel { channel: "webhook", .. })
        );
    }

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }
}
