use axum::Json;
use axum::extract::{Path, State};
use tokio::sync::oneshot;

use amphi_core::game_trait::ParticipantId;
use amphi_core::snapshot::{DisplaySnapshot, ParticipantSnapshot};

use crate::error::AppError;
use crate::game_loop::GameCommand;
use crate::state::AppState;

/// Send a query to the game loop and wait for its answer.
pub(crate) async fn query<T>(
    state: &AppState,
    build: impl FnOnce(oneshot::Sender<T>) -> GameCommand,
) -> Result<T, AppError> {
    let (reply, rx) = oneshot::channel();
    state
        .commands
        .send(build(reply))
        .map_err(|_| AppError::Unavailable("game loop stopped".to_string()))?;
    rx.await
        .map_err(|_| AppError::Unavailable("game loop did not respond".to_string()))
}

/// GET /api/v1/state. Same snapshot displays receive.
pub async fn get_state(State(state): State<AppState>) -> Result<Json<DisplaySnapshot>, AppError> {
    let snapshot = query(&state, |reply| GameCommand::Snapshot { reply }).await?;
    Ok(Json(snapshot))
}

/// GET /api/v1/participants/{id}
pub async fn get_participant(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<ParticipantSnapshot>, AppError> {
    query(&state, |reply| GameCommand::ParticipantState { id, reply })
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("participant {id} not found")))
}
