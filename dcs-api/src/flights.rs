use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Json, Router,
};
use dcs_core::SeatGrid;
use dcs_shared::{Flight, FlightDraft};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SaveFlightResponse {
    /// `None` when the form had no flight number and nothing was saved
    pub id: Option<String>,
    pub saved: bool,
}

impl From<Option<String>> for SaveFlightResponse {
    fn from(id: Option<String>) -> Self {
        Self {
            saved: id.is_some(),
            id,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flights", get(list_flights).post(create_flight))
        .route("/v1/flights/active", get(get_active_flight).post(save_active_flight))
        .route("/v1/flights/active/seat-map", get(get_seat_map))
        .route("/v1/flights/active/stream", get(stream_events))
        .route("/v1/flights/{id}/activate", post(activate_flight))
        .route("/v1/flights/{id}", delete(delete_flight))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/flights
/// Flight roster, most recently updated first
pub async fn list_flights(State(state): State<AppState>) -> Result<Json<Vec<Flight>>, AppError> {
    let mut desk = state.desk.lock().await;
    desk.refresh_flights().await?;
    Ok(Json(desk.flights().to_vec()))
}

/// POST /v1/flights
/// Save the form as a new flight and make it active
pub async fn create_flight(
    State(state): State<AppState>,
    Json(draft): Json<FlightDraft>,
) -> Result<(StatusCode, Json<SaveFlightResponse>), AppError> {
    let mut desk = state.desk.lock().await;
    let id = desk.create_flight(draft).await?;
    let status = if id.is_some() { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(id.into())))
}

/// POST /v1/flights/active
/// Save the form over the active flight (creates one when none is active)
pub async fn save_active_flight(
    State(state): State<AppState>,
    Json(draft): Json<FlightDraft>,
) -> Result<Json<SaveFlightResponse>, AppError> {
    let mut desk = state.desk.lock().await;
    let id = desk.save_active_flight(draft).await?;
    Ok(Json(id.into()))
}

/// GET /v1/flights/active
pub async fn get_active_flight(State(state): State<AppState>) -> Result<Json<Flight>, AppError> {
    let desk = state.desk.lock().await;
    desk.active_flight()
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError("No active flight".to_string()))
}

/// POST /v1/flights/{id}/activate
pub async fn activate_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Flight>, AppError> {
    let mut desk = state.desk.lock().await;
    desk.load_flight(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("Flight {} not found", id)))
}

/// DELETE /v1/flights/{id}
/// Removes the flight and all of its passengers
pub async fn delete_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut desk = state.desk.lock().await;
    desk.delete_flight(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/flights/active/seat-map
pub async fn get_seat_map(State(state): State<AppState>) -> Result<Json<SeatGrid>, AppError> {
    let desk = state.desk.lock().await;
    desk.seat_grid()?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError("Active flight has no seat map".to_string()))
}

/// GET /v1/flights/active/stream
/// Server-sent boarding events of the flight active when the stream opened
pub async fn stream_events(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (flight_id, rx) = {
        let desk = state.desk.lock().await;
        let flight_id = desk.session().require_active()?.to_string();
        (flight_id, desk.subscribe())
    };

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let flight_id = flight_id.clone();
        async move {
            match result {
                Ok(event) if event.flight_id == flight_id => Event::default()
                    .event(event_name(&event.kind))
                    .json_data(&event)
                    .ok()
                    .map(Ok),
                _ => None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn event_name(kind: &dcs_shared::BoardingEventKind) -> &'static str {
    use dcs_shared::BoardingEventKind::*;
    match kind {
        CheckedIn => "checked_in",
        CheckInReverted => "check_in_reverted",
        Boarded => "boarded",
        Unboarded => "unboarded",
    }
}
