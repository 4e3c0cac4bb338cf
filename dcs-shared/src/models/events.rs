use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoardingEventKind {
    CheckedIn,
    CheckInReverted,
    Boarded,
    Unboarded,
}

/// Published to live gate displays whenever a passenger changes state.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BoardingEvent {
    pub event_id: Uuid,
    pub flight_id: String,
    pub passenger_id: String,
    pub kind: BoardingEventKind,
    pub seat: Option<String>,
    pub at: DateTime<Utc>,
}

impl BoardingEvent {
    pub fn new(
        flight_id: &str,
        passenger_id: &str,
        kind: BoardingEventKind,
        seat: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            flight_id: flight_id.to_string(),
            passenger_id: passenger_id.to_string(),
            kind,
            seat,
            at: Utc::now(),
        }
    }
}
