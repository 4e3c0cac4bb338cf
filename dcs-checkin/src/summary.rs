use std::collections::BTreeMap;

use dcs_core::seating::{fallback_section, row_of_seat, section_for_seat};
use dcs_shared::{boarding_percentage, Flight, Passenger, PassengerType, SeatMap};
use serde::Serialize;

/// Checked-in passengers by type
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TypeBreakdown {
    pub adult: u32,
    pub child: u32,
    pub infant: u32,
}

/// Flight report shown at the gate and printed at departure.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightSummary {
    pub flight_id: String,
    pub flight_number: String,
    pub total_passengers: u32,
    pub checked_in: u32,
    pub boarded: u32,
    pub pending: u32,
    pub percentage: u32,
    pub by_type: TypeBreakdown,
    /// Section name -> boarded passengers seated there
    pub by_section: BTreeMap<String, u32>,
    pub bags: u32,
    /// Kilograms
    pub total_bag_weight: f64,
}

impl FlightSummary {
    pub fn build(flight: &Flight, seat_map: Option<&SeatMap>, passengers: &[Passenger]) -> Self {
        let mut summary = Self {
            flight_id: flight.id.clone(),
            flight_number: flight.flight_number.clone(),
            total_passengers: passengers.len() as u32,
            checked_in: 0,
            boarded: 0,
            pending: 0,
            percentage: 0,
            by_type: TypeBreakdown::default(),
            by_section: BTreeMap::new(),
            bags: 0,
            total_bag_weight: 0.0,
        };

        for passenger in passengers.iter().filter(|p| p.checked_in) {
            summary.checked_in += 1;
            summary.bags += passenger.baggage.count;
            summary.total_bag_weight += passenger.baggage.total_weight;

            match passenger.passenger_type {
                PassengerType::Adult => summary.by_type.adult += 1,
                PassengerType::Child => summary.by_type.child += 1,
                PassengerType::Infant => summary.by_type.infant += 1,
            }

            if passenger.boarded {
                summary.boarded += 1;
                if let Some(section) = passenger
                    .seat
                    .as_deref()
                    .and_then(|seat| section_of(seat_map, seat))
                {
                    *summary.by_section.entry(section).or_insert(0) += 1;
                }
            }
        }

        summary.pending = summary.checked_in - summary.boarded;
        summary.percentage = boarding_percentage(summary.boarded, summary.checked_in);
        summary
    }
}

fn section_of(seat_map: Option<&SeatMap>, seat: &str) -> Option<String> {
    match seat_map {
        Some(map) => section_for_seat(map, seat),
        None => row_of_seat(seat).map(|row| fallback_section(row).to_string()),
    }
}
