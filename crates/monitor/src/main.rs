use anyhow::Context;
use secwatch_monitor::config::MonitorConfig;
use secwatch_monitor::context::MonitorContext;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = MonitorConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(
        mode = ?config.mode,
        metrics_addr = %config.metrics_addr,
        interval_secs = config.poll_interval.as_secs(),
        "Configuration loaded",
    );

    let context = MonitorContext::init(config)
        .await
        .context("Monitor startup failed")?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let mut monitor = context.monitor();
    monitor.run(cancel).await;

    tracing::info!("Monitor loop finished, cleaning up");
    context.shutdown().await;
    tracing::info!("Graceful shutdown complete");

    Ok(())
}

/// `RUST_LOG` filter, defaulting to `info` for this crate; JSON lines when
/// `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "secwatch_monitor=info,secwatch_events=info,tower_http=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
///
/// A handler that cannot be installed never fires; the other one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), finishing current cycle before shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, finishing current cycle before shutdown");
        }
    }
}
