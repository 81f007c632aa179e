use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::api::query;
use crate::error::AppError;
use crate::game_loop::{GameCommand, SessionStats};
use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub game: SessionStats,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
}

/// Returns server status, connection counts, and session counters as JSON.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let websocket = state.ws_connection_count.load(Ordering::Relaxed);
    let game = query(&state, |reply| GameCommand::Stats { reply }).await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { websocket },
        game,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use amphi_core::phase::Phase;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            connections: ConnectionInfo { websocket: 5 },
            game: SessionStats {
                phase: Phase::Playing,
                round_number: 2,
                joined: 6,
                alive: 4,
                displays: 1,
            },
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"healthy\""));
        assert!(json.contains("\"websocket\":5"));
        assert!(json.contains("\"phase\":\"Playing\""));
        assert!(json.contains("\"alive\":4"));
    }
}
