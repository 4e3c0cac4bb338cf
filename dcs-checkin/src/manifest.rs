//! Passenger manifest import.
//!
//! Manifests arrive as CSV exports from the reservation system. Headers are
//! matched case-insensitively with spaces folded to underscores, so
//! `Document Number` and `document_number` are the same column.

use std::collections::HashMap;
use std::io::Read;

use csv::StringRecord;
use dcs_core::CoreError;
use dcs_shared::{Gender, PassengerType};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Unreadable manifest: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required headers: {0}")]
    MissingHeaders(String),
    #[error("Manifest has no passenger rows")]
    Empty,
    #[error("{} invalid row(s): {}", .0.len(), .0.join("; "))]
    InvalidRows(Vec<String>),
}

impl From<ManifestError> for CoreError {
    fn from(e: ManifestError) -> Self {
        CoreError::Manifest(e.to_string())
    }
}

/// One passenger line of a manifest
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRow {
    pub first_name: String,
    pub last_name: String,
    /// Falls back to the configured default document type when absent
    pub document_type: Option<String>,
    pub document_number: String,
    pub ticket_number: Option<String>,
    pub passenger_type: PassengerType,
    pub gender: Option<Gender>,
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

fn header_map(headers: &StringRecord) -> Result<HashMap<String, usize>, ManifestError> {
    let map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, h)| (normalize_header(h), idx))
        .collect();

    let mut missing = Vec::new();
    if !map.contains_key("document_number") {
        missing.push("document_number");
    }
    let has_name = map.contains_key("name")
        || (map.contains_key("first_name") && map.contains_key("last_name"));
    if !has_name {
        missing.push("name (or first_name and last_name)");
    }

    if missing.is_empty() {
        Ok(map)
    } else {
        Err(ManifestError::MissingHeaders(missing.join(", ")))
    }
}

/// Splits `SMITH/JOHN` or `Smith, John`. A name without separator is taken
/// as surname only.
pub fn split_name(raw: &str) -> (String, String) {
    let raw = raw.trim();
    let parts = raw.split_once('/').or_else(|| raw.split_once(','));
    match parts {
        Some((last, first)) => (first.trim().to_string(), last.trim().to_string()),
        None => (String::new(), raw.to_string()),
    }
}

fn parse_row(record: &StringRecord, map: &HashMap<String, usize>) -> Result<ManifestRow, Vec<String>> {
    let get_field = |name: &str| -> Option<String> {
        map.get(name)
            .and_then(|&idx| record.get(idx))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let mut errors = Vec::new();

    let (first_name, last_name) = match get_field("name") {
        Some(name) => split_name(&name),
        None => (
            get_field("first_name").unwrap_or_default(),
            get_field("last_name").unwrap_or_default(),
        ),
    };
    if last_name.is_empty() {
        errors.push("last name is missing".to_string());
    }

    let document_number = get_field("document_number").unwrap_or_else(|| {
        errors.push("document_number is missing".to_string());
        String::new()
    });

    let passenger_type = match get_field("passenger_type") {
        Some(raw) => PassengerType::parse(&raw).unwrap_or_else(|| {
            errors.push(format!("passenger_type: unknown value '{raw}'"));
            PassengerType::default()
        }),
        None => PassengerType::default(),
    };

    let gender = get_field("gender").and_then(|raw| {
        let parsed = Gender::parse(&raw);
        if parsed.is_none() {
            errors.push(format!("gender: unknown value '{raw}'"));
        }
        parsed
    });

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ManifestRow {
        first_name,
        last_name,
        document_type: get_field("document_type"),
        document_number,
        ticket_number: get_field("ticket_number"),
        passenger_type,
        gender,
    })
}

/// Parses a whole manifest. Any invalid row rejects the file, with every
/// problem listed by row number (1-based, header excluded).
pub fn parse_manifest_csv<R: Read>(reader: R) -> Result<Vec<ManifestRow>, ManifestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let map = header_map(csv_reader.headers()?)?;

    let mut rows = Vec::new();
    let mut problems = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        match parse_row(&record, &map) {
            Ok(row) => rows.push(row),
            Err(errors) => problems.push(format!("row {}: {}", idx + 1, errors.join(", "))),
        }
    }

    if !problems.is_empty() {
        return Err(ManifestError::InvalidRows(problems));
    }
    if rows.is_empty() {
        return Err(ManifestError::Empty);
    }
    Ok(rows)
}
