use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use dcs_checkin::{BoardingPass, ImportSummary};
use dcs_shared::Passenger;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PassengerFilter {
    pub checked_in: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub seat: Option<String>,
    /// One entry per bag, in the desk's preferred weight unit
    #[serde(default)]
    pub bags: Vec<f64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/passengers", get(list_passengers))
        .route("/v1/passengers/import", post(import_manifest))
        .route(
            "/v1/passengers/{id}/check-in",
            post(check_in).delete(un_check_in),
        )
        .route("/v1/passengers/{id}/board", post(board).delete(unboard))
        .route("/v1/passengers/{id}/boarding-pass", post(issue_boarding_pass))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/passengers?checked_in=true
/// Passengers of the active flight
pub async fn list_passengers(
    State(state): State<AppState>,
    Query(filter): Query<PassengerFilter>,
) -> Result<Json<Vec<Passenger>>, AppError> {
    let desk = state.desk.lock().await;
    desk.session().require_active()?;
    let passengers = desk
        .passengers()
        .iter()
        .filter(|p| filter.checked_in.map_or(true, |wanted| p.checked_in == wanted))
        .cloned()
        .collect();
    Ok(Json(passengers))
}

/// POST /v1/passengers/import
/// CSV manifest in the request body
pub async fn import_manifest(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportSummary>, AppError> {
    let mut desk = state.desk.lock().await;
    let summary = desk.import_manifest_csv(body.as_bytes()).await?;
    Ok(Json(summary))
}

/// POST /v1/passengers/{id}/check-in
pub async fn check_in(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CheckInRequest>,
) -> Result<Json<Passenger>, AppError> {
    let mut desk = state.desk.lock().await;
    let passenger = desk.check_in(&id, req.seat.as_deref(), &req.bags).await?;
    Ok(Json(passenger))
}

/// DELETE /v1/passengers/{id}/check-in
pub async fn un_check_in(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Passenger>, AppError> {
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.un_check_in(&id).await?))
}

/// POST /v1/passengers/{id}/board
pub async fn board(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Passenger>, AppError> {
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.board(&id).await?))
}

/// DELETE /v1/passengers/{id}/board
pub async fn unboard(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Passenger>, AppError> {
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.unboard(&id).await?))
}

/// POST /v1/passengers/{id}/boarding-pass
pub async fn issue_boarding_pass(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BoardingPass>, AppError> {
    let mut desk = state.desk.lock().await;
    Ok(Json(desk.issue_boarding_pass(&id).await?))
}
