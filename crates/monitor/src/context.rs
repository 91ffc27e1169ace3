//! Process-wide resources, built once at startup and torn down at exit.
//!
//! [`MonitorContext::init`] performs every fallible startup step (database
//! connection, migrations, model load, metrics bind). Any failure here is
//! fatal and the loop never starts.

use std::sync::Arc;

use secwatch_core::collaborators::{DataSource, Notifier, Scorer};
use secwatch_core::error::CoreError;
use secwatch_db::DbPool;
use secwatch_events::{EmailDelivery, EmailError, LogDelivery, WebhookDelivery, WebhookError};
use tokio::net::TcpListener;

use crate::config::{ConfigError, MonitorConfig, MonitorMode};
use crate::metrics::MonitorMetrics;
use crate::scheduler::{Collaborators, Monitor};
use crate::scoring::{LogisticModel, LogisticScorer, ModelError, RuleScorer};
use crate::server::MetricsServer;
use crate::sources::{HealthWindowSource, HttpDeviceSource};
use crate::store::PgObservationStore;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to load scoring model: {0}")]
    Model(#[from] ModelError),

    #[error("Failed to bind metrics endpoint on {addr}: {source}")]
    MetricsBind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Failed to build device HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Email channel misconfigured: {0}")]
    Email(#[from] EmailError),

    #[error("Webhook channel misconfigured: {0}")]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub struct MonitorContext {
    config: MonitorConfig,
    pool: DbPool,
    metrics: Arc<MonitorMetrics>,
    server: MetricsServer,
    io: Collaborators,
}

impl MonitorContext {
    pub async fn init(config: MonitorConfig) -> Result<Self, StartupError> {
        let pool = secwatch_db::create_pool(&config.database_url).await?;
        tracing::info!("Database connection pool created");

        secwatch_db::health_check(&pool).await?;
        tracing::info!("Database health check passed");

        secwatch_db::run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");

        let scorer: Arc<dyn Scorer> = match &config.model_path {
            Some(path) => {
                let model = LogisticModel::load(path)?;
                tracing::info!(
                    path = %path.display(),
                    features = model.weights.len(),
                    threshold = model.threshold,
                    "Scoring model loaded",
                );
                Arc::new(LogisticScorer::new(model))
            }
            None => Arc::new(RuleScorer),
        };

        let source: Arc<dyn DataSource> = match config.mode {
            MonitorMode::Devices => Arc::new(HttpDeviceSource::new(
                config.device_api_base_url.clone(),
                config.fetch_timeout,
            )?),
            MonitorMode::Health => Arc::new(HealthWindowSource::new(pool.clone(), config.health_window)?),
        };

        let notifier = build_notifier(&config)?;

        let metrics = Arc::new(MonitorMetrics::new()?);
        let listener = TcpListener::bind(config.metrics_addr)
            .await
            .map_err(|source| StartupError::MetricsBind {
                addr: config.metrics_addr,
                source,
            })?;
        let server = MetricsServer::spawn(listener, Arc::clone(&metrics)).map_err(|source| {
            StartupError::MetricsBind {
                addr: config.metrics_addr,
                source,
            }
        })?;

        let io = Collaborators {
            source,
            scorer,
            store: Arc::new(PgObservationStore::new(pool.clone())),
            notifier,
            metrics: metrics.clone(),
        };

        Ok(Self {
            config,
            pool,
            metrics,
            server,
            io,
        })
    }

    /// Build the loop over this context's entity set and collaborators.
    pub fn monitor(&self) -> Monitor {
        Monitor::new(self.config.entities(), self.config.settings(), self.io.clone())
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MonitorMetrics> {
        &self.metrics
    }

    /// Stop the metrics endpoint and close the database pool.
    pub async fn shutdown(self) {
        self.server.shutdown().await;
        tracing::info!("Metrics endpoint stopped");

        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

/// Pick the alert channel: email, then webhook, then log-only.
fn build_notifier(config: &MonitorConfig) -> Result<Arc<dyn Notifier>, StartupError> {
    if let Some(email) = &config.email {
        if config.webhook_url.is_some() {
            tracing::warn!("Both SMTP and webhook alerting configured; using email");
        }
        let delivery = EmailDelivery::new(email.clone())?;
        tracing::info!(smtp_host = %email.smtp_host, recipients = email.recipients.len(), "Email alerting enabled");
        return Ok(Arc::new(delivery));
    }

    if let Some(url) = &config.webhook_url {
        let delivery = WebhookDelivery::new(url.clone())?;
        tracing::info!(url = %url, "Webhook alerting enabled");
        return Ok(Arc::new(delivery));
    }

    tracing::warn!("No alert channel configured; alerts will only be logged");
    Ok(Arc::new(LogDelivery))
}
