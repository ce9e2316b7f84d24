// Main entry point - Dependency injection and task wiring
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::atomic::Ordering, sync::Arc};
use axum::{routing::get, Router};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use crate::application::backfill_service::BackfillService;
use crate::application::channel_router::ChannelRouter;
use crate::application::waveform_monitor::WaveformMonitor;
use crate::infrastructure::config::load_observer_config;
use crate::infrastructure::history_client::HttpHistoryClient;
use crate::infrastructure::tcp_session::{ReconnectingSession, SessionSettings, TcpConnector};
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{get_helicorder, get_waveform, health_check};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_observer_config()?;

    // Ingestion: TCP session -> decoder -> channel router
    let router = Arc::new(ChannelRouter::default());
    let session = ReconnectingSession::new(
        TcpConnector::new(config.source.address()),
        router.clone(),
        SessionSettings {
            reconnect_delay: config.source.reconnect_delay(),
            read_timeout: config.source.read_timeout(),
            read_chunk_size: config.source.read_chunk_size,
        },
    );
    let session_stats = session.stats();
    tracing::info!("Reading frames from {}", config.source.address());
    tokio::spawn(async move { session.run().await });

    // Periodic tick: channel router -> resampler -> rolling buffers -> snapshots
    let (snapshot_tx, snapshot_rx) = watch::channel(Vec::new());
    let mut monitor = WaveformMonitor::new(router, config.display.to_settings());
    let refresh = config.display.refresh();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // Clocks advance on every tick, so publish even without new samples.
            monitor.tick();
            snapshot_tx.send_replace(monitor.snapshots());
            tracing::debug!(
                "Session: {} connects, {} frames, {} discarded, {} transport errors",
                session_stats.connects.load(Ordering::Relaxed),
                session_stats.frames.load(Ordering::Relaxed),
                session_stats.discarded.load(Ordering::Relaxed),
                session_stats.transport_errors.load(Ordering::Relaxed)
            );
        }
    });

    // On-demand backfill through the history API
    let history = HttpHistoryClient::new(
        config.history.base_url.clone(),
        std::time::Duration::from_millis(config.history.timeout_ms),
    )?;
    let backfill = BackfillService::new(Arc::new(history), config.history.max_span_ms);

    let state = Arc::new(AppState {
        snapshots: snapshot_rx,
        backfill,
        station: config.station.clone(),
        default_hours: config.history.default_hours,
        max_hours: config.history.max_hours,
        ts_offset_ms: config.history.ts_offset_ms,
    });

    let app = Router::new()
        .route("/healthz", get(health_check))
        .route("/waveform", get(get_waveform))
        .route("/helicorder", get(get_helicorder))
        .with_state(state);

    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Serving waveform snapshots on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
