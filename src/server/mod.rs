use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tower_http::trace::TraceLayer;
use crate::sync::ReconciliationEngine;

pub mod routes;

/// Server state
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/events", post(routes::handle_event))
        .route("/sync", post(routes::synchronize))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the event intake; with `sync_interval`, also reconcile on a fixed tick
pub async fn start_server(
    port: u16,
    engine: Arc<ReconciliationEngine>,
    sync_interval: Option<Duration>,
) -> anyhow::Result<()> {
    if let Some(period) = sync_interval {
        tokio::spawn(periodic_sync(engine.clone(), period));
    }

    let app = router(Arc::new(AppState { engine }));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);
    println!("🌍 Listening for source events at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn periodic_sync(engine: Arc<ReconciliationEngine>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let engine = engine.clone();
        match tokio::task::spawn_blocking(move || engine.synchronize_inventory()).await {
            Ok(Ok(report)) => tracing::debug!(failures = report.failures.len(), "periodic reconciliation done"),
            Ok(Err(e)) => tracing::warn!(error = %e, "periodic reconciliation failed"),
            Err(e) => tracing::error!(error = %e, "periodic reconciliation task panicked"),
        }
    }
}
