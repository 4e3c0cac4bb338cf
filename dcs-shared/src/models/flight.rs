use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::seat_map::SeatMapConfig;

/// Boarding progress cached on the flight document
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoardingCounters {
    pub checked_in: u32,
    pub boarded: u32,
    pub percentage: u32,
}

impl BoardingCounters {
    pub fn compute(checked_in: u32, boarded: u32) -> Self {
        Self {
            checked_in,
            boarded,
            percentage: boarding_percentage(boarded, checked_in),
        }
    }

    pub fn pending(&self) -> u32 {
        self.checked_in.saturating_sub(self.boarded)
    }
}

/// `round(100 * boarded / checked_in)`, zero when nobody is checked in.
pub fn boarding_percentage(boarded: u32, checked_in: u32) -> u32 {
    if checked_in == 0 {
        return 0;
    }
    let boarded = u64::from(boarded);
    let checked_in = u64::from(checked_in);
    // Half rounds up
    ((200 * boarded + checked_in) / (2 * checked_in)) as u32
}

/// Editable part of a flight, as submitted by the flight form
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightDraft {
    #[serde(default)]
    pub flight_number: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub aircraft_type: String,
    #[serde(default)]
    pub gate: Option<String>,
    #[serde(default)]
    pub boarding_time: Option<NaiveTime>,
    #[serde(default)]
    pub seat_config: Option<SeatMapConfig>,
}

impl FlightDraft {
    pub fn has_flight_number(&self) -> bool {
        !self.flight_number.trim().is_empty()
    }
}

/// The flight document stored in the `flights` collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub id: String,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub aircraft_type: String,
    #[serde(default)]
    pub gate: Option<String>,
    #[serde(default)]
    pub boarding_time: Option<NaiveTime>,
    #[serde(default)]
    pub seat_config: Option<SeatMapConfig>,
    #[serde(default)]
    pub boarding: BoardingCounters,
    #[serde(default)]
    pub boarded_passenger_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_boarding_update: Option<DateTime<Utc>>,
}

impl Flight {
    pub fn new(id: String, draft: FlightDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            flight_number: draft.flight_number.trim().to_uppercase(),
            origin: draft.origin.trim().to_uppercase(),
            destination: draft.destination.trim().to_uppercase(),
            date: draft.date,
            time: draft.time,
            aircraft_type: draft.aircraft_type,
            gate: draft.gate,
            boarding_time: draft.boarding_time,
            seat_config: draft.seat_config,
            boarding: BoardingCounters::default(),
            boarded_passenger_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            last_boarding_update: None,
        }
    }

    /// Overwrite every form field; boarding state and creation time stay.
    pub fn apply_draft(&mut self, draft: FlightDraft, now: DateTime<Utc>) {
        self.flight_number = draft.flight_number.trim().to_uppercase();
        self.origin = draft.origin.trim().to_uppercase();
        self.destination = draft.destination.trim().to_uppercase();
        self.date = draft.date;
        self.time = draft.time;
        self.aircraft_type = draft.aircraft_type;
        self.gate = draft.gate;
        self.boarding_time = draft.boarding_time;
        self.seat_config = draft.seat_config;
        self.updated_at = now;
    }

    pub fn record_boarding(
        &mut self,
        counters: BoardingCounters,
        boarded_ids: BTreeSet<String>,
        now: DateTime<Utc>,
    ) {
        self.boarding = counters;
        self.boarded_passenger_ids = boarded_ids;
        self.last_boarding_update = Some(now);
        self.updated_at = now;
    }

    /// e.g. `AV123 BOG-MAD`
    pub fn label(&self) -> String {
        format!("{} {}-{}", self.flight_number, self.origin, self.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_zero_when_nobody_checked_in() {
        assert_eq!(boarding_percentage(0, 0), 0);
    }

    #[test]
    fn test_percentage_rounding() {
        for boarded in 0..=1 {
            assert_eq!(boarding_percentage(boarded, 1), boarded * 100);
        }
        for boarded in 0..=50 {
            let expected = (100.0 * boarded as f64 / 50.0).round() as u32;
            assert_eq!(boarding_percentage(boarded, 50), expected);
        }
        // 1/3 -> 33, 2/3 -> 67, 1/8 -> 12.5 -> 13
        assert_eq!(boarding_percentage(1, 3), 33);
        assert_eq!(boarding_percentage(2, 3), 67);
        assert_eq!(boarding_percentage(1, 8), 13);
    }

    #[test]
    fn test_flight_document_shape() {
        let now = Utc::now();
        let draft = FlightDraft {
            flight_number: " av123 ".to_string(),
            origin: "bog".to_string(),
            destination: "mad".to_string(),
            aircraft_type: "A320".to_string(),
            ..Default::default()
        };
        let flight = Flight::new("FL-1".to_string(), draft, now);
        assert_eq!(flight.flight_number, "AV123");
        assert_eq!(flight.label(), "AV123 BOG-MAD");

        let doc = serde_json::to_value(&flight).unwrap();
        assert_eq!(doc["flightNumber"], "AV123");
        assert_eq!(doc["boarding"]["checkedIn"], 0);
        assert!(doc["boardedPassengerIds"].as_array().unwrap().is_empty());
    }
}
