use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::baggage::BaggageRecord;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassengerType {
    #[default]
    Adult,
    Child,
    Infant,
}

impl PassengerType {
    /// Accepts the codes found in manifests (`ADT`, `CHD`, `INF`) as well as
    /// the full words.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "ADULT" | "ADT" | "A" => Some(Self::Adult),
            "CHILD" | "CHD" | "CNN" | "C" => Some(Self::Child),
            "INFANT" | "INF" | "I" => Some(Self::Infant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "X")]
    Unspecified,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "M" | "MALE" => Some(Self::Male),
            "F" | "FEMALE" => Some(Self::Female),
            "X" | "U" => Some(Self::Unspecified),
            _ => None,
        }
    }
}

/// Identity of a passenger across manifest uploads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub document_type: String,
    pub document_number: String,
}

impl DocumentKey {
    pub fn new(document_type: &str, document_number: &str) -> Self {
        Self {
            document_type: document_type.trim().to_uppercase(),
            document_number: document_number
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_uppercase(),
        }
    }
}

/// The passenger document stored in the `passengers` collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub id: String,
    pub flight_id: String,
    pub first_name: String,
    pub last_name: String,
    pub document_type: String,
    pub document_number: String,
    #[serde(default)]
    pub ticket_number: Option<String>,
    #[serde(default)]
    pub passenger_type: PassengerType,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub seat: Option<String>,
    #[serde(default)]
    pub baggage: BaggageRecord,
    #[serde(default)]
    pub checked_in: bool,
    #[serde(default)]
    pub check_in_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub boarded: bool,
    #[serde(default)]
    pub boarded_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub boarding_pass_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Passenger {
    pub fn document_key(&self) -> DocumentKey {
        DocumentKey::new(&self.document_type, &self.document_number)
    }

    /// `LAST/FIRST`, the form printed on boarding passes
    pub fn display_name(&self) -> String {
        format!(
            "{}/{}",
            self.last_name.trim().to_uppercase(),
            self.first_name.trim().to_uppercase()
        )
    }

    pub fn is_pending_boarding(&self) -> bool {
        self.checked_in && !self.boarded
    }

    /// Back to the not-checked-in state. Identity and document fields stay.
    pub fn revert_check_in(&mut self, now: DateTime<Utc>) {
        self.checked_in = false;
        self.check_in_time = None;
        self.seat = None;
        self.boarded = false;
        self.boarded_time = None;
        self.boarding_pass_ref = None;
        self.baggage.clear();
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_key_normalisation() {
        assert_eq!(
            DocumentKey::new(" passport", "ab 123 45"),
            DocumentKey::new("PASSPORT", "AB12345")
        );
        assert_ne!(
            DocumentKey::new("PASSPORT", "123"),
            DocumentKey::new("ID", "123")
        );
    }

    #[test]
    fn test_passenger_type_codes() {
        assert_eq!(PassengerType::parse("chd"), Some(PassengerType::Child));
        assert_eq!(PassengerType::parse("Infant"), Some(PassengerType::Infant));
        assert_eq!(PassengerType::parse("?"), None);
    }
}
