//! Dashboard API route handlers and WebSocket channel (§6, §11).
//!
//! Every handler here is a thin, read-only view over `Scanner` state —
//! `/api/scan` is the one exception, an explicit out-of-band trigger —
//! none of them add new core semantics. JSON responses carry the
//! bit-stable `Opportunity` shape from §6 plus `formatted_text` (§11).

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::engine::format::{format_opportunities_table, format_opportunity, DISCLAIMER};
use crate::engine::scanner::{Scanner, Subscriber};
use crate::types::{d, Market, Opportunity, OpportunityType, ScanResult};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// Shared state for every route handler: the Scanner (the single source
/// of truth for the current snapshot and opportunity list) plus a
/// broadcast channel that fans published `ScanResult`s out to however
/// many WebSocket clients happen to be connected.
pub struct DashboardState {
    pub scanner: Arc<Scanner>,
    pub broadcast: broadcast::Sender<ScanResult>,
}

impl DashboardState {
    pub fn new(scanner: Arc<Scanner>) -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self { scanner, broadcast: tx }
    }
}

/// Bridges the Scanner's `Subscriber` callback (§4.7) into the
/// dashboard's broadcast channel. Registered once at startup; a scan
/// cycle with no WebSocket clients connected just has its broadcast
/// dropped (`send` on a channel with no receivers is not an error).
pub struct BroadcastBridge {
    pub tx: broadcast::Sender<ScanResult>,
}

#[async_trait]
impl Subscriber for BroadcastBridge {
    async fn on_scan_result(&self, result: &ScanResult) {
        let _ = self.tx.send(result.clone());
    }
}

// ---------------------------------------------------------------------------
// Opportunity JSON rendering
// ---------------------------------------------------------------------------

/// Adds the `formatted_text` field (§11) to the derived `Opportunity`
/// serialization, producing the exact shape documented in §6.
fn opportunity_json(opp: &Opportunity) -> serde_json::Value {
    let mut value = serde_json::to_value(opp).unwrap_or(serde_json::Value::Null);
    if let serde_json::Value::Object(ref mut map) = value {
        map.insert("formatted_text".to_string(), json!(format_opportunity(opp)));
    }
    value
}

fn opportunity_views(opps: &[Opportunity], limit: usize) -> Vec<serde_json::Value> {
    opps.iter().take(limit).map(opportunity_json).collect()
}

// ---------------------------------------------------------------------------
// GET /api/opportunities
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct OpportunityQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub min_profit: Option<f64>,
    pub risk: Option<String>,
    pub sport: Option<String>,
    pub format: Option<String>,
}

fn passes_filters(opp: &Opportunity, q: &OpportunityQuery) -> bool {
    if let Some(kind) = &q.kind {
        if !opp.kind.to_string().eq_ignore_ascii_case(kind) {
            return false;
        }
    }
    if let Some(min_profit) = q.min_profit {
        if opp.expected_profit_pct < d(min_profit) {
            return false;
        }
    }
    if let Some(risk) = &q.risk {
        if !opp.risk.to_string().eq_ignore_ascii_case(risk) {
            return false;
        }
    }
    if let Some(sport) = &q.sport {
        let sport_lower = sport.to_lowercase();
        let matches_category = opp.category.to_lowercase().contains(&sport_lower);
        let matches_market_type = opp.market_type.to_string().contains(&sport_lower);
        if !matches_category && !matches_market_type {
            return false;
        }
    }
    true
}

pub async fn get_opportunities(
    State(state): State<AppState>,
    Query(q): Query<OpportunityQuery>,
) -> impl IntoResponse {
    let opps = state.scanner.current_opportunities().await;
    let filtered: Vec<Opportunity> = opps.into_iter().filter(|o| passes_filters(o, &q)).collect();

    if q.format.as_deref() == Some("text") {
        return format_opportunities_table(&filtered).into_response();
    }

    Json(json!({
        "count": filtered.len(),
        "opportunities": opportunity_views(&filtered, filtered.len()),
        "disclaimer": DISCLAIMER,
    }))
    .into_response()
}

// ---------------------------------------------------------------------------
// GET /api/opportunities/:event_id
// ---------------------------------------------------------------------------

pub async fn get_opportunity(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> impl IntoResponse {
    let opps = state.scanner.current_opportunities().await;
    match opps.iter().find(|o| o.event_id == event_id) {
        Some(opp) => Json(opportunity_json(opp)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /api/scan
// ---------------------------------------------------------------------------

fn scan_result_json(result: &ScanResult) -> serde_json::Value {
    json!({
        "timestamp": result.timestamp,
        "markets_scanned": result.markets_scanned,
        "scan_duration_ms": result.scan_duration_ms,
        "opportunities_count": result.opportunities.len(),
        "opportunities": opportunity_views(&result.opportunities, result.opportunities.len()),
        "disclaimer": DISCLAIMER,
    })
}

/// Triggers an out-of-band scan cycle, outside the regular
/// `SCAN_INTERVAL_SECONDS` cadence (§11). Shares the same `Scanner` the
/// background loop drives, so it publishes to the same subscribers.
pub async fn trigger_scan(State(state): State<AppState>) -> Json<serde_json::Value> {
    let result = state.scanner.scan_once().await;
    Json(scan_result_json(&result))
}

// ---------------------------------------------------------------------------
// GET /api/markets
// ---------------------------------------------------------------------------

pub async fn get_markets(State(state): State<AppState>) -> Json<std::collections::HashMap<String, Market>> {
    Json(state.scanner.current_snapshot().await)
}

// ---------------------------------------------------------------------------
// GET /api/stats
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub markets_scanned: usize,
    pub opportunities_count: usize,
    pub arbitrage_count: usize,
    pub ev_count: usize,
    pub scan_duration_ms: u64,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub disclaimer: &'static str,
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(build_stats(&state).await)
}

async fn build_stats(state: &DashboardState) -> StatsResponse {
    let last = state.scanner.last_scan_result().await;
    let opps = state.scanner.current_opportunities().await;
    let arbitrage_count = opps.iter().filter(|o| o.kind == OpportunityType::Arbitrage).count();
    let ev_count = opps.iter().filter(|o| o.kind == OpportunityType::Ev).count();
    StatsResponse {
        markets_scanned: last.as_ref().map(|r| r.markets_scanned).unwrap_or(0),
        opportunities_count: opps.len(),
        arbitrage_count,
        ev_count,
        scan_duration_ms: last.as_ref().map(|r| r.scan_duration_ms).unwrap_or(0),
        last_scan_at: last.map(|r| r.timestamp),
        disclaimer: DISCLAIMER,
    }
}

// ---------------------------------------------------------------------------
// GET /api/sources
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    pub venue: String,
    pub market_count: usize,
    pub status: &'static str,
}

pub async fn get_sources(State(state): State<AppState>) -> Json<Vec<SourceStatus>> {
    let statuses = state.scanner.source_status().await;
    Json(
        statuses
            .into_iter()
            .map(|(venue, market_count)| SourceStatus {
                venue,
                market_count,
                status: if market_count > 0 { "active" } else { "inactive" },
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// GET /ws
// ---------------------------------------------------------------------------

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn connected_payload(state: &DashboardState) -> String {
    let opps = state.scanner.current_opportunities().await;
    json!({
        "type": "connected",
        "disclaimer": DISCLAIMER,
        "opportunities_count": opps.len(),
        "opportunities": opportunity_views(&opps, 50),
    })
    .to_string()
}

fn scan_result_payload(result: &ScanResult) -> String {
    json!({
        "type": "scan_result",
        "timestamp": result.timestamp,
        "markets_scanned": result.markets_scanned,
        "scan_duration_ms": result.scan_duration_ms,
        "opportunities_count": result.opportunities.len(),
        "opportunities": opportunity_views(&result.opportunities, 50),
    })
    .to_string()
}

/// The three commands §6 documents: `ping`, `get_opportunities`,
/// `get_stats`. Anything else gets an `error` reply rather than being
/// silently dropped, so a client can tell a typo from a dead connection.
async fn handle_command(text: &str, state: &DashboardState) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(text).ok()?;
    let command = parsed
        .get("command")
        .or_else(|| parsed.get("type"))
        .and_then(|v| v.as_str())?;

    let reply = match command {
        "ping" => json!({"type": "pong"}),
        "get_opportunities" => {
            let opps = state.scanner.current_opportunities().await;
            json!({
                "type": "opportunities",
                "opportunities_count": opps.len(),
                "opportunities": opportunity_views(&opps, 50),
            })
        }
        "get_stats" => {
            let stats = build_stats(state).await;
            json!({"type": "stats", "stats": stats})
        }
        other => json!({"type": "error", "message": format!("unknown command: {other}")}),
    };
    Some(reply.to_string())
}

/// Splits the socket so the broadcast-forwarding task and the
/// command-handling loop can each hold the sender half without fighting
/// over a single `&mut WebSocket` (§5: WebSocket send is its own
/// suspension point, independent of the scan loop).
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    if sender
        .lock()
        .await
        .send(Message::Text(connected_payload(&state).await))
        .await
        .is_err()
    {
        return;
    }

    let mut scan_rx = state.broadcast.subscribe();
    let forward_sender = Arc::clone(&sender);
    let forward_task = tokio::spawn(async move {
        loop {
            match scan_rx.recv().await {
                Ok(result) => {
                    let payload = scan_result_payload(&result);
                    if forward_sender.lock().await.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagged behind scan broadcast");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                if let Some(reply) = handle_command(&text, &state).await {
                    if sender.lock().await.send(Message::Text(reply)).await.is_err() {
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward_task.abort();
    info!("websocket connection closed");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
