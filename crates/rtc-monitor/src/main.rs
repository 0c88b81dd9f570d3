//! RTC Monitor
//!
//! Negotiates a receive-only WebRTC session with a signaling endpoint and
//! exports per-stream statistics on `/metrics`.

use rtc_monitor::config::Config;
use rtc_monitor::engine::WebRtcEngine;
use rtc_monitor::errors::MonitorError;
use rtc_monitor::negotiation::SignalingClient;
use rtc_monitor::observability::{metrics_router, prometheus_recorder, MetricsRegistry};
use rtc_monitor::session::{Session, SessionSettings};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rtc_monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RTC Monitor");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        signaling_url = %config.signaling_url,
        metrics_bind_address = %config.metrics_bind_address,
        stats_interval_ms = u64::try_from(config.stats_interval.as_millis()).unwrap_or(u64::MAX),
        stun_servers = config.stun_urls.len(),
        turn_enabled = config.turn.is_some(),
        wait_for_gathering = config.wait_for_gathering,
        accumulation = %config.accumulation,
        stream_failure_policy = %config.stream_failure_policy,
        "Configuration loaded successfully"
    );

    let (recorder, prometheus_handle) = prometheus_recorder();
    let registry = Arc::new(MetricsRegistry::new(Arc::new(recorder)));

    let shutdown_token = CancellationToken::new();

    // Bind before spawning to fail fast on bind errors
    let metrics_addr: SocketAddr = config.metrics_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.metrics_bind_address, "Invalid metrics bind address");
        MonitorError::Metrics(format!("invalid bind address: {e}"))
    })?;
    let listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %metrics_addr, "Failed to bind metrics server");
            MonitorError::Metrics(format!("failed to bind {metrics_addr}: {e}"))
        })?;
    info!(addr = %metrics_addr, "Metrics server bound successfully");

    let metrics_shutdown = shutdown_token.child_token();
    let metrics_server = tokio::spawn(async move {
        let server = axum::serve(listener, metrics_router(prometheus_handle))
            .with_graceful_shutdown(async move {
                metrics_shutdown.cancelled().await;
                info!("Metrics server shutting down");
            });
        if let Err(e) = server.await {
            error!(error = %e, "Metrics server error");
        }
    });

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let engine = WebRtcEngine::new(&config.ice_servers(), events_tx)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create transport engine");
            e
        })?;
    let signaling = SignalingClient::new(config.signaling_url.clone())?;

    let session = Session::new(
        engine,
        signaling,
        registry,
        SessionSettings::from(&config),
    );

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let result = session.run(events_rx, shutdown_token.clone()).await;

    shutdown_token.cancel();
    if let Err(e) = metrics_server.await {
        error!(error = %e, "Metrics server task ended abnormally");
    }

    match result {
        Ok(()) => {
            info!("RTC Monitor shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "RTC Monitor stopped on fatal error");
            Err(e.into())
        }
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
