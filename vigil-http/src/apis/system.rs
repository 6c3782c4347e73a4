use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::error;

use crate::{ErrorResponse, ServerState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Bytes
    pub memory_used: u64,
    /// Bytes
    pub memory_total: u64,
    pub memory_percent: f64,
    pub start_time: i64,
    pub active_sessions: usize,
    pub log_subscribers: usize,
}

/// Host memory usage
#[derive(Debug, Clone, Copy, PartialEq)]
struct MemoryStats {
    used: u64,
    total: u64,
    percent: f64,
}

impl MemoryStats {
    /// `None` when the host reports no memory, which means the read failed
    fn from_bytes(used: u64, total: u64) -> Option<Self> {
        if total == 0 {
            return None;
        }
        Some(Self {
            used,
            total,
            percent: used as f64 / total as f64 * 100.0,
        })
    }

    fn read() -> Option<Self> {
        let mut system = System::new();
        system.refresh_memory();
        Self::from_bytes(system.used_memory(), system.total_memory())
    }
}

pub async fn handle_stats(State(state): State<ServerState>) -> Result<Json<StatsResponse>, ErrorResponse> {
    let memory = tokio::task::spawn_blocking(MemoryStats::read)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| {
            error!("failed to read memory stats");
            ErrorResponse::internal_error()
        })?;

    Ok(Json(StatsResponse {
        memory_used: memory.used,
        memory_total: memory.total,
        memory_percent: memory.percent,
        start_time: state.start_time,
        active_sessions: state.sessions.len().await,
        log_subscribers: state.hub.subscriber_count(),
    }))
}
