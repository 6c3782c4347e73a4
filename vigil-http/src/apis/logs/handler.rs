use axum::{
    extract::State,
    http::{HeaderName, HeaderValue},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    Extension,
};
use serde::Serialize;
use tracing::info;
use vigil_core::session::short_id;
use vigil_core::EventRecord;

use crate::session::SessionId;
use crate::streaming::{log_event_stream, HEARTBEAT_INTERVAL};
use crate::ServerState;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub logs: Vec<EventRecord>,
    pub count: usize,
}

/// Live log stream: recent history first, then new events as they are published
pub async fn handle_stream(
    State(state): State<ServerState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> Response {
    // Subscribe before taking the snapshot so nothing published in between is lost
    let subscription = state.hub.subscribe();
    let history = state.hub.history();
    let client = short_id(&session_id).to_string();

    info!(session = %client, replay = history.len(), "log stream client connected");

    let stream = log_event_stream(history, subscription, client);
    let sse = Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat"));

    // Keep reverse proxies from buffering the stream
    (
        [(HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no"))],
        sse,
    )
        .into_response()
}

/// Snapshot of the retained log events
pub async fn handle_history(State(state): State<ServerState>) -> Json<HistoryResponse> {
    let logs = state.hub.history();
    Json(HistoryResponse {
        count: logs.len(),
        logs,
    })
}
