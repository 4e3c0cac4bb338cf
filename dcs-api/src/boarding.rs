use axum::{extract::State, routing::post, Json, Router};
use dcs_checkin::SyncOutcome;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BulkBoardingResponse {
    pub affected: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/boarding/board-all", post(board_all))
        .route("/v1/boarding/reset", post(reset))
        .route("/v1/boarding/sync", post(sync))
}

/// POST /v1/boarding/board-all
/// Boards every checked-in passenger not yet boarded
pub async fn board_all(
    State(state): State<AppState>,
) -> Result<Json<BulkBoardingResponse>, AppError> {
    let mut desk = state.desk.lock().await;
    let affected = desk.board_all_pending().await?;
    Ok(Json(BulkBoardingResponse { affected }))
}

/// POST /v1/boarding/reset
pub async fn reset(State(state): State<AppState>) -> Result<Json<BulkBoardingResponse>, AppError> {
    let mut desk = state.desk.lock().await;
    let affected = desk.reset_boarding().await?;
    Ok(Json(BulkBoardingResponse { affected }))
}

/// POST /v1/boarding/sync
/// Pushes pending offline changes; a failed push is reported, not raised
pub async fn sync(State(state): State<AppState>) -> Result<Json<SyncOutcome>, AppError> {
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.sync().await?))
}
