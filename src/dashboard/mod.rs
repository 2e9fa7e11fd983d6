//! Dashboard — Axum read-only HTTP surface and WebSocket channel (§6, §11).
//!
//! Every handler in [`routes`] is a thin collaborator over `Scanner`
//! state: none of them add core odds-intelligence semantics, they just
//! render what the scan loop already published. CORS is enabled for
//! local development against the bundled single-page view.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::engine::scanner::Scanner;
use routes::{AppState, BroadcastBridge, DashboardState};

/// The embedded single-page dashboard view (compiled into the binary).
const DASHBOARD_HTML: &str = include_str!("templates/index.html");

/// Builds the Axum router and registers a [`BroadcastBridge`] with
/// `scanner` so every published `ScanResult` reaches connected WebSocket
/// clients (§4.7, §5) without the scan loop knowing the dashboard exists.
pub async fn build_router(scanner: Arc<Scanner>) -> Router {
    let state: AppState = Arc::new(DashboardState::new(Arc::clone(&scanner)));
    scanner
        .subscribe(Arc::new(BroadcastBridge { tx: state.broadcast.clone() }))
        .await;

    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/opportunities", get(routes::get_opportunities))
        .route("/api/opportunities/:event_id", get(routes::get_opportunity))
        .route("/api/scan", post(routes::trigger_scan))
        .route("/api/markets", get(routes::get_markets))
        .route("/api/stats", get(routes::get_stats))
        .route("/api/sources", get(routes::get_sources))
        .route("/ws", get(routes::websocket_handler))
        .route("/health", get(routes::health))
        .route("/", get(serve_dashboard))
        .layer(cors)
        .with_state(state)
}

/// Binds `port` and serves the dashboard until the listener errors.
/// `main` spawns this in its own task so a dashboard fault never stalls
/// the scan loop (§5) — the two run as independent tokio tasks sharing
/// only the `Arc<Scanner>`.
pub async fn serve(scanner: Arc<Scanner>, port: u16) -> Result<()> {
    let app = build_router(scanner).await;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard port {port}"))?;
    info!(port, "dashboard listening on http://{addr}");
    axum::serve(listener, app).await.context("dashboard server exited")?;
    Ok(())
}

/// Serve the embedded HTML dashboard.
async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
