use chrono::{Datelike, Utc};
use dcs_core::{CoreError, CoreResult};
use dcs_shared::{Flight, Passenger};
use serde::Serialize;
use uuid::Uuid;

/// Boarding pass handed to the print/barcode sink.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoardingPass {
    /// `BP-<flight>-<seat>-<8 hex>`
    pub reference: String,
    /// Bar-coded boarding pass text (IATA BCBP mandatory items)
    pub payload: String,
    pub passenger_name: String,
    pub flight_number: String,
    pub seat: String,
    pub gate: Option<String>,
    pub sequence: u32,
}

impl BoardingPass {
    /// `sequence` is the passenger's check-in order on the flight.
    pub fn issue(flight: &Flight, passenger: &Passenger, sequence: u32) -> CoreResult<Self> {
        if !passenger.checked_in {
            return Err(CoreError::ValidationError(format!(
                "Passenger {} is not checked in",
                passenger.id
            )));
        }
        let seat = passenger.seat.clone().ok_or_else(|| {
            CoreError::ValidationError(format!("Passenger {} has no seat", passenger.id))
        })?;

        Ok(Self {
            reference: generate_reference(&flight.flight_number, &seat),
            payload: bcbp_payload(flight, passenger, &seat, sequence),
            passenger_name: passenger.display_name(),
            flight_number: flight.flight_number.clone(),
            seat,
            gate: flight.gate.clone(),
            sequence,
        })
    }
}

fn generate_reference(flight_number: &str, seat: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("BP-{}-{}-{}", flight_number, seat, token[..8].to_uppercase())
}

/// Splits `AV123` into carrier `AV` and number `123`.
fn split_flight_number(flight_number: &str) -> (&str, &str) {
    let at = flight_number
        .char_indices()
        .skip(2)
        .find(|(_, c)| c.is_ascii_digit())
        .map(|(idx, _)| idx)
        .or_else(|| flight_number.char_indices().nth(2).map(|(idx, _)| idx))
        .unwrap_or(flight_number.len());
    flight_number.split_at(at)
}

/// `14C` -> `014C`
fn bcbp_seat(seat: &str) -> String {
    let digits: String = seat.chars().take_while(|c| c.is_ascii_digit()).collect();
    let letter: String = seat.chars().skip_while(|c| c.is_ascii_digit()).collect();
    format!("{:0>3}{}", digits, letter)
}

fn fixed(value: &str, width: usize) -> String {
    let truncated: String = value.chars().take(width).collect();
    format!("{:<width$}", truncated, width = width)
}

fn bcbp_payload(flight: &Flight, passenger: &Passenger, seat: &str, sequence: u32) -> String {
    let (carrier, number) = split_flight_number(&flight.flight_number);
    let day_of_year = flight
        .date
        .map(|d| d.ordinal())
        .unwrap_or_else(|| Utc::now().ordinal());
    let record_locator: String = passenger
        .ticket_number
        .as_deref()
        .unwrap_or(&passenger.id)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect::<String>()
        .to_uppercase();

    format!(
        "M1{}E{}{}{}{}{:0>4} {:03}Y{}{:05}1",
        fixed(&passenger.display_name(), 20),
        fixed(&record_locator, 7),
        fixed(&flight.origin, 3),
        fixed(&flight.destination, 3),
        fixed(carrier, 3),
        number,
        day_of_year,
        fixed(&bcbp_seat(seat), 4),
        sequence,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dcs_shared::FlightDraft;

    fn flight() -> Flight {
        Flight::new(
            "FL-1".to_string(),
            FlightDraft {
                flight_number: "AV123".to_string(),
                origin: "BOG".to_string(),
                destination: "MAD".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 2, 1),
                gate: Some("B7".to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    fn passenger(checked_in: bool) -> Passenger {
        Passenger {
            id: "PX-1".to_string(),
            flight_id: "FL-1".to_string(),
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            document_type: "PASSPORT".to_string(),
            document_number: "AB123".to_string(),
            ticket_number: None,
            passenger_type: Default::default(),
            gender: None,
            seat: checked_in.then(|| "14C".to_string()),
            baggage: Default::default(),
            checked_in,
            check_in_time: None,
            boarded: false,
            boarded_time: None,
            boarding_pass_ref: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_reference_format() {
        let pass = BoardingPass::issue(&flight(), &passenger(true), 3).unwrap();
        assert!(pass.reference.starts_with("BP-AV123-14C-"));
        let token = pass.reference.rsplit('-').next().unwrap();
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(pass.gate.as_deref(), Some("B7"));
    }

    #[test]
    fn test_bcbp_layout() {
        let pass = BoardingPass::issue(&flight(), &passenger(true), 3).unwrap();
        let payload = &pass.payload;

        assert!(payload.starts_with("M1SMITH/JOHN          E"));
        assert_eq!(&payload[30..36], "BOGMAD");
        assert_eq!(&payload[36..39], "AV ");
        assert_eq!(&payload[39..44], "0123 ");
        // 1 February is day 32
        assert_eq!(&payload[44..47], "032");
        assert_eq!(&payload[47..48], "Y");
        assert_eq!(&payload[48..52], "014C");
        assert_eq!(&payload[52..57], "00003");
        assert_eq!(&payload[57..], "1");
        assert_eq!(payload.len(), 58);
    }

    #[test]
    fn test_non_ascii_flight_number() {
        let mut flight = flight();
        flight.flight_number = "aä".to_string();
        let pass = BoardingPass::issue(&flight, &passenger(true), 1).unwrap();
        assert_eq!(pass.payload.chars().count(), 58);
        assert!(pass.payload.contains("aä 0000"));

        assert_eq!(split_flight_number("ÄÖ123"), ("ÄÖ", "123"));
        assert_eq!(split_flight_number("Ä"), ("Ä", ""));
        assert_eq!(split_flight_number("AVX"), ("AV", "X"));
    }

    #[test]
    fn test_requires_check_in() {
        assert!(BoardingPass::issue(&flight(), &passenger(false), 1).is_err());
    }
}
