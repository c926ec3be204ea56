//! Read-only HTTP status endpoints.
//!
//! `/status` returns the full point-in-time snapshot; `/health`, `/ping`
//! and `/ready` are the cheap probes. No endpoint mutates anything, so all
//! of them are safe to poll while transpilation is in flight.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use serde::{Deserialize, Serialize};

use crate::deps::TrackerStatistics;
use crate::patch::{ErrorRecord, MetricRecord};
use crate::runtime::SessionStatus;
use crate::server::ws::ClientRegistry;

/// How many recent patch/error records `/status` includes.
const RECENT_WINDOW: usize = 10;

/// Point-in-time session snapshot. Also the schema the `status` subcommand
/// parses, so it derives both halves of serde.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub uptime_secs: u64,
    pub total_patches: u64,
    pub total_errors: u64,
    pub connected_clients: usize,
    pub scan_complete: bool,
    pub tracker: TrackerStatistics,
    pub recent_patches: Vec<MetricRecord>,
    pub recent_errors: Vec<ErrorRecord>,
}

#[derive(Clone)]
pub struct StatusState {
    pub status: Arc<SessionStatus>,
    pub clients: Arc<ClientRegistry>,
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/ping", get(ping_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}

async fn status_handler(State(state): State<StatusState>) -> Json<StatusSnapshot> {
    let log = state.status.log.read().await;
    Json(StatusSnapshot {
        uptime_secs: state.status.uptime_secs(),
        total_patches: log.total_patches(),
        total_errors: log.total_errors(),
        connected_clients: state.clients.client_count(),
        scan_complete: state.status.is_scan_complete(),
        tracker: log.tracker_stats.clone(),
        recent_patches: log.last_patches(RECENT_WINDOW),
        recent_errors: log.last_errors(RECENT_WINDOW),
    })
}

async fn health_handler(State(state): State<StatusState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "uptime_secs": state.status.uptime_secs(),
    }))
}

async fn ping_handler() -> &'static str {
    "pong"
}

async fn ready_handler(State(state): State<StatusState>) -> (StatusCode, Json<serde_json::Value>) {
    let ready = state.status.is_scan_complete();
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(serde_json::json!({ "ready": ready })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{Patch, PatchLog, now_ms};

    fn state() -> StatusState {
        StatusState {
            status: Arc::new(SessionStatus::new(PatchLog::new(16, 16, 16))),
            clients: Arc::new(ClientRegistry::new()),
        }
    }

    #[tokio::test]
    async fn test_status_snapshot_reflects_log() {
        let state = state();
        {
            let mut log = state.status.log.write().await;
            let version = log.next_version("scr_a");
            log.record_patch(
                Patch {
                    id: format!("scr_a#{version}"),
                    symbol_id: "scr_a".into(),
                    js_body: String::new(),
                    source_text: String::new(),
                    version,
                    timestamp_ms: now_ms(),
                },
                "scr_a.gml",
                3,
            );
            log.record_error("scr_b.gml", "unbalanced '{'");
        }
        state.status.mark_scan_complete();

        let Json(snapshot) = status_handler(State(state)).await;
        assert_eq!(snapshot.total_patches, 1);
        assert_eq!(snapshot.total_errors, 1);
        assert_eq!(snapshot.connected_clients, 0);
        assert!(snapshot.scan_complete);
        assert_eq!(snapshot.recent_patches.len(), 1);
        assert_eq!(snapshot.recent_errors[0].file_path, "scr_b.gml");
    }

    #[tokio::test]
    async fn test_ready_is_503_until_scan_completes() {
        let state = state();
        let (code, _) = ready_handler(State(state.clone())).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);

        state.status.mark_scan_complete();
        let (code, _) = ready_handler(State(state)).await;
        assert_eq!(code, StatusCode::OK);
    }

    #[test]
    fn test_snapshot_roundtrips_through_json() {
        let snapshot = StatusSnapshot {
            uptime_secs: 5,
            total_patches: 2,
            total_errors: 1,
            connected_clients: 3,
            scan_complete: true,
            tracker: TrackerStatistics::default(),
            recent_patches: Vec::new(),
            recent_errors: Vec::new(),
        };
        let json = serde_json::to_string(&snapshot).expect("serialize");
        let back: StatusSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.total_patches, 2);
        assert!(back.scan_complete);
    }
}
