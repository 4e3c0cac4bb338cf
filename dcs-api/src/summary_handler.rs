use axum::{extract::State, routing::get, Json, Router};
use dcs_checkin::{FlightSummary, SyncOutcome};
use dcs_core::{Connectivity, Preferences};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectivityRequest {
    pub connectivity: Connectivity,
}

#[derive(Debug, Serialize)]
pub struct ConnectivityResponse {
    pub connectivity: Connectivity,
    /// Present when this change brought the desk back online
    pub sync: Option<SyncOutcome>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/summary", get(get_summary))
        .route("/v1/preferences", get(get_preferences).put(put_preferences))
        .route("/v1/connectivity", axum::routing::put(put_connectivity))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let desk = state.desk.lock().await;
    Json(serde_json::json!({
        "status": "ok",
        "connectivity": desk.session().connectivity(),
        "activeFlightId": desk.session().active_flight_id(),
    }))
}

/// GET /v1/summary
/// Boarding report of the active flight
pub async fn get_summary(State(state): State<AppState>) -> Result<Json<FlightSummary>, AppError> {
    let desk = state.desk.lock().await;
    Ok(Json(desk.summary()?))
}

/// GET /v1/preferences
pub async fn get_preferences(State(state): State<AppState>) -> Result<Json<Preferences>, AppError> {
    let desk = state.desk.lock().await;
    Ok(Json(desk.preferences().await?))
}

/// PUT /v1/preferences
pub async fn put_preferences(
    State(state): State<AppState>,
    Json(prefs): Json<Preferences>,
) -> Result<Json<Preferences>, AppError> {
    let desk = state.desk.lock().await;
    desk.set_preferences(prefs).await?;
    Ok(Json(prefs))
}

/// PUT /v1/connectivity
/// Manual override of the probed connectivity state
pub async fn put_connectivity(
    State(state): State<AppState>,
    Json(req): Json<ConnectivityRequest>,
) -> Result<Json<ConnectivityResponse>, AppError> {
    let mut desk = state.desk.lock().await;
    let sync = desk.set_connectivity(req.connectivity).await?;
    Ok(Json(ConnectivityResponse {
        connectivity: desk.session().connectivity(),
        sync,
    }))
}
