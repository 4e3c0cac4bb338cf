//! Seat-map normalisation and occupancy resolution.
//!
//! Stored configurations come in two shapes (explicit rows, or the older
//! row-count plus column template). [`normalize`] turns either into one
//! [`SeatMap`]; nothing downstream looks at the stored shape again.

use std::collections::{BTreeSet, HashMap};

use dcs_shared::{
    Cell, CellConfig, LegacyLayout, Passenger, RowLayout, Seat, SeatMap, SeatMapConfig,
    SeatPosition, SeatRow, SeatSide,
};
use serde::Serialize;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SeatingError {
    #[error("row {row}: seat label must not be empty")]
    EmptyLabel { row: u32 },
    #[error("row {row}: seat label {label:?} is longer than two characters")]
    LabelTooLong { row: u32, label: String },
    #[error("row {row}: seat label {label:?} appears twice")]
    DuplicateLabel { row: u32, label: String },
    #[error("column {0:?} appears twice in the template")]
    DuplicateColumn(String),
    #[error("row {0} is defined twice")]
    DuplicateRow(u32),
    #[error("row numbers start at 1")]
    ZeroRow,
    #[error("column template {0:?} has no seats")]
    EmptyTemplate(String),
}

pub fn normalize(config: &SeatMapConfig) -> Result<SeatMap, SeatingError> {
    match config {
        SeatMapConfig::RowBased(layout) => normalize_rows(layout),
        SeatMapConfig::Legacy(layout) => expand_legacy(layout),
    }
}

fn normalize_rows(layout: &RowLayout) -> Result<SeatMap, SeatingError> {
    let mut seen_rows = BTreeSet::new();
    let mut rows = Vec::with_capacity(layout.rows.len());

    for row in &layout.rows {
        if row.row_number == 0 {
            return Err(SeatingError::ZeroRow);
        }
        if !seen_rows.insert(row.row_number) {
            return Err(SeatingError::DuplicateRow(row.row_number));
        }

        let mut labels = BTreeSet::new();
        let mut cells = Vec::with_capacity(row.cells.len());
        for cell in &row.cells {
            match cell {
                CellConfig::Aisle => cells.push(Cell::Aisle),
                CellConfig::Seat(seat) => {
                    let label = check_label(row.row_number, &seat.label)?;
                    if !labels.insert(label.clone()) {
                        return Err(SeatingError::DuplicateLabel {
                            row: row.row_number,
                            label,
                        });
                    }
                    cells.push(Cell::Seat(Seat {
                        id: Seat::seat_id(row.row_number, &label),
                        row: row.row_number,
                        label,
                        side: seat.side,
                        position: seat.position,
                        blocked: seat.blocked,
                        premium: seat.premium,
                        special: seat.special,
                    }));
                }
            }
        }

        rows.push(SeatRow {
            number: row.row_number,
            section: row
                .section
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            emergency_exit: row.emergency_exit,
            cells,
        });
    }

    Ok(SeatMap { rows })
}

fn check_label(row: u32, raw: &str) -> Result<String, SeatingError> {
    let label = raw.trim().to_uppercase();
    match label.chars().count() {
        0 => Err(SeatingError::EmptyLabel { row }),
        1 | 2 => Ok(label),
        _ => Err(SeatingError::LabelTooLong { row, label }),
    }
}

fn is_aisle_marker(c: char) -> bool {
    matches!(c, '-' | '_' | ' ' | '|')
}

/// Cell layout shared by every legacy row: `None` is an aisle.
fn legacy_columns(template: &str) -> Result<Vec<Option<(String, SeatSide, SeatPosition)>>, SeatingError> {
    let chars: Vec<char> = template.trim().chars().collect();
    let seat_total = chars.iter().filter(|c| !is_aisle_marker(**c)).count();
    if seat_total == 0 {
        return Err(SeatingError::EmptyTemplate(template.to_string()));
    }

    let mut columns = Vec::with_capacity(chars.len());
    let mut seat_index = 0;
    let mut labels = BTreeSet::new();
    for (i, c) in chars.iter().enumerate() {
        if is_aisle_marker(*c) {
            // Collapse runs of markers into one aisle
            if !matches!(columns.last(), Some(None)) {
                columns.push(None);
            }
            continue;
        }

        let label = c.to_uppercase().to_string();
        if !labels.insert(label.clone()) {
            return Err(SeatingError::DuplicateColumn(label));
        }

        let side = if seat_index < seat_total / 2 || seat_total == 1 {
            SeatSide::Left
        } else {
            SeatSide::Right
        };

        let at_edge = i == 0 || i == chars.len() - 1;
        let next_to_aisle = (i > 0 && is_aisle_marker(chars[i - 1]))
            || (i + 1 < chars.len() && is_aisle_marker(chars[i + 1]));
        let position = if at_edge {
            SeatPosition::Window
        } else if next_to_aisle {
            SeatPosition::Aisle
        } else {
            SeatPosition::Middle
        };

        columns.push(Some((label, side, position)));
        seat_index += 1;
    }
    Ok(columns)
}

fn expand_legacy(layout: &LegacyLayout) -> Result<SeatMap, SeatingError> {
    let columns = legacy_columns(&layout.column_template)?;
    let skip: BTreeSet<u32> = layout.skip_rows.iter().copied().collect();
    let emergency: BTreeSet<u32> = layout.emergency_rows.iter().copied().collect();

    let rows = (1..=layout.row_count)
        .filter(|number| !skip.contains(number))
        .map(|number| SeatRow {
            number,
            section: None,
            emergency_exit: emergency.contains(&number),
            cells: columns
                .iter()
                .map(|column| match column {
                    Some((label, side, position)) => Cell::Seat(Seat {
                        id: Seat::seat_id(number, label),
                        row: number,
                        label: label.clone(),
                        side: *side,
                        position: *position,
                        blocked: false,
                        premium: false,
                        special: false,
                    }),
                    None => Cell::Aisle,
                })
                .collect(),
        })
        .collect();

    Ok(SeatMap { rows })
}

// ============================================================================
// Sections
// ============================================================================

/// Leading digits of a seat id (`"14C"` -> 14)
pub fn row_of_seat(seat_id: &str) -> Option<u32> {
    let digits: String = seat_id.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Rough cabin zone by row number; only used when the map names no section.
pub fn fallback_section(row: u32) -> &'static str {
    match row {
        0..=10 => "front",
        11..=20 => "middle",
        _ => "rear",
    }
}

pub fn section_for_row(map: &SeatMap, row: u32) -> String {
    map.row(row)
        .and_then(|r| r.section.clone())
        .unwrap_or_else(|| fallback_section(row).to_string())
}

pub fn section_for_seat(map: &SeatMap, seat_id: &str) -> Option<String> {
    row_of_seat(seat_id).map(|row| section_for_row(map, row))
}

// ============================================================================
// Occupancy
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Occupied {
        #[serde(rename = "passengerId")]
        passenger_id: String,
    },
    Blocked,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GridCell {
    Seat { seat: Seat, status: SeatStatus },
    Aisle,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    pub number: u32,
    pub section: String,
    pub emergency_exit: bool,
    pub cells: Vec<GridCell>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeatGrid {
    pub rows: Vec<GridRow>,
}

impl SeatGrid {
    pub fn status_of(&self, seat_id: &str) -> Option<&SeatStatus> {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter())
            .find_map(|cell| match cell {
                GridCell::Seat { seat, status } if seat.id == seat_id => Some(status),
                _ => None,
            })
    }

    fn count(&self, pred: impl Fn(&SeatStatus) -> bool) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter())
            .filter(|cell| matches!(cell, GridCell::Seat { status, .. } if pred(status)))
            .count()
    }

    pub fn available_count(&self) -> usize {
        self.count(|s| matches!(s, SeatStatus::Available))
    }

    pub fn occupied_count(&self) -> usize {
        self.count(|s| matches!(s, SeatStatus::Occupied { .. }))
    }
}

/// Annotates every seat with who (if anyone) holds it. Only checked-in
/// passengers occupy seats; a held seat reads as occupied even if blocked.
pub fn resolve(map: &SeatMap, passengers: &[Passenger]) -> SeatGrid {
    let occupants: HashMap<&str, &str> = passengers
        .iter()
        .filter(|p| p.checked_in)
        .filter_map(|p| p.seat.as_deref().map(|seat| (seat, p.id.as_str())))
        .collect();

    let rows = map
        .rows
        .iter()
        .map(|row| GridRow {
            number: row.number,
            section: section_for_row(map, row.number),
            emergency_exit: row.emergency_exit,
            cells: row
                .cells
                .iter()
                .map(|cell| match cell {
                    Cell::Aisle => GridCell::Aisle,
                    Cell::Seat(seat) => {
                        let status = match occupants.get(seat.id.as_str()) {
                            Some(passenger_id) => SeatStatus::Occupied {
                                passenger_id: passenger_id.to_string(),
                            },
                            None if seat.blocked => SeatStatus::Blocked,
                            None => SeatStatus::Available,
                        };
                        GridCell::Seat {
                            seat: seat.clone(),
                            status,
                        }
                    }
                })
                .collect(),
        })
        .collect();

    SeatGrid { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dcs_shared::{BaggageRecord, PassengerType, RowConfig, SeatConfig};

    fn seat(label: &str, side: SeatSide, position: SeatPosition) -> CellConfig {
        CellConfig::Seat(SeatConfig {
            label: label.to_string(),
            side,
            position,
            blocked: false,
            premium: false,
            special: false,
        })
    }

    fn row_based(numbers: &[u32]) -> SeatMapConfig {
        SeatMapConfig::RowBased(RowLayout {
            rows: numbers
                .iter()
                .map(|n| RowConfig {
                    row_number: *n,
                    section: None,
                    emergency_exit: false,
                    cells: vec![
                        seat("A", SeatSide::Left, SeatPosition::Window),
                        seat("B", SeatSide::Left, SeatPosition::Middle),
                        seat("C", SeatSide::Left, SeatPosition::Aisle),
                        CellConfig::Aisle,
                        seat("D", SeatSide::Right, SeatPosition::Aisle),
                        seat("E", SeatSide::Right, SeatPosition::Middle),
                        seat("F", SeatSide::Right, SeatPosition::Window),
                    ],
                })
                .collect(),
        })
    }

    fn legacy(row_count: u32) -> SeatMapConfig {
        SeatMapConfig::Legacy(LegacyLayout {
            row_count,
            column_template: "ABC-DEF".to_string(),
            skip_rows: vec![],
            emergency_rows: vec![],
        })
    }

    fn passenger(id: &str, seat: &str) -> Passenger {
        Passenger {
            id: id.to_string(),
            flight_id: "FL-1".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Smith".to_string(),
            document_type: "PASSPORT".to_string(),
            document_number: id.to_string(),
            ticket_number: None,
            passenger_type: PassengerType::Adult,
            gender: None,
            seat: Some(seat.to_string()),
            baggage: BaggageRecord::default(),
            checked_in: true,
            check_in_time: Some(Utc::now()),
            boarded: false,
            boarded_time: None,
            boarding_pass_ref: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_12_seat_a_addresses_as_12a_in_both_formats() {
        let explicit = normalize(&row_based(&[12])).unwrap();
        assert!(explicit.contains("12A"));

        let flat = normalize(&legacy(12)).unwrap();
        assert!(flat.contains("12A"));
        assert_eq!(flat.row(12).unwrap().seats().next().unwrap().id, "12A");
    }

    #[test]
    fn test_both_formats_share_addressing() {
        let rows: Vec<u32> = (1..=30).collect();
        let explicit = normalize(&row_based(&rows)).unwrap();
        let flat = normalize(&legacy(30)).unwrap();
        assert_eq!(explicit.seat_ids(), flat.seat_ids());

        // Side and position derived from the template match the explicit layout
        let explicit_seats: Vec<_> = explicit.seats().map(|s| (s.side, s.position)).collect();
        let flat_seats: Vec<_> = flat.seats().map(|s| (s.side, s.position)).collect();
        assert_eq!(explicit_seats, flat_seats);
    }

    #[test]
    fn test_legacy_skip_and_emergency_rows() {
        let config = SeatMapConfig::Legacy(LegacyLayout {
            row_count: 15,
            column_template: "AB_CD".to_string(),
            skip_rows: vec![13],
            emergency_rows: vec![12],
        });
        let map = normalize(&config).unwrap();
        assert_eq!(map.rows.len(), 14);
        assert!(map.row(13).is_none());
        assert!(!map.contains("13A"));
        assert!(map.row(12).unwrap().emergency_exit);
        assert_eq!(map.capacity(), 14 * 4);
    }

    #[test]
    fn test_duplicate_label_in_row_rejected() {
        let config = SeatMapConfig::RowBased(RowLayout {
            rows: vec![RowConfig {
                row_number: 3,
                section: None,
                emergency_exit: false,
                cells: vec![
                    seat("A", SeatSide::Left, SeatPosition::Window),
                    seat("a", SeatSide::Right, SeatPosition::Window),
                ],
            }],
        });
        assert_eq!(
            normalize(&config),
            Err(SeatingError::DuplicateLabel {
                row: 3,
                label: "A".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_template_column_rejected() {
        let config = SeatMapConfig::Legacy(LegacyLayout {
            row_count: 10,
            column_template: "AB-bC".to_string(),
            skip_rows: vec![],
            emergency_rows: vec![],
        });
        assert_eq!(
            normalize(&config),
            Err(SeatingError::DuplicateColumn("B".to_string()))
        );
    }

    #[test]
    fn test_label_too_long_rejected() {
        let config = SeatMapConfig::RowBased(RowLayout {
            rows: vec![RowConfig {
                row_number: 1,
                section: None,
                emergency_exit: false,
                cells: vec![seat("ABC", SeatSide::Left, SeatPosition::Window)],
            }],
        });
        assert!(matches!(
            normalize(&config),
            Err(SeatingError::LabelTooLong { row: 1, .. })
        ));
    }

    #[test]
    fn test_section_fallback_ranges() {
        let map = normalize(&legacy(30)).unwrap();
        assert_eq!(section_for_row(&map, 1), "front");
        assert_eq!(section_for_row(&map, 10), "front");
        assert_eq!(section_for_row(&map, 11), "middle");
        assert_eq!(section_for_row(&map, 20), "middle");
        assert_eq!(section_for_row(&map, 21), "rear");
        assert_eq!(section_for_seat(&map, "14C").as_deref(), Some("middle"));
        assert_eq!(section_for_seat(&map, "C"), None);
    }

    #[test]
    fn test_explicit_section_wins() {
        let mut config = row_based(&[5, 25]);
        if let SeatMapConfig::RowBased(layout) = &mut config {
            layout.rows[0].section = Some("Business".to_string());
        }
        let map = normalize(&config).unwrap();
        assert_eq!(section_for_row(&map, 5), "Business");
        assert_eq!(section_for_row(&map, 25), "rear");
    }

    #[test]
    fn test_resolve_marks_occupancy() {
        let mut config = row_based(&[1, 2]);
        if let SeatMapConfig::RowBased(layout) = &mut config {
            if let CellConfig::Seat(s) = &mut layout.rows[1].cells[0] {
                s.blocked = true;
            }
        }
        let map = normalize(&config).unwrap();

        let mut not_checked_in = passenger("P3", "1B");
        not_checked_in.checked_in = false;
        let passengers = vec![passenger("P1", "1A"), passenger("P2", "2A"), not_checked_in];

        let grid = resolve(&map, &passengers);
        assert_eq!(
            grid.status_of("1A"),
            Some(&SeatStatus::Occupied {
                passenger_id: "P1".to_string()
            })
        );
        assert_eq!(
            grid.status_of("2A"),
            Some(&SeatStatus::Occupied {
                passenger_id: "P2".to_string()
            })
        );
        assert_eq!(grid.status_of("1B"), Some(&SeatStatus::Available));
        assert_eq!(grid.occupied_count(), 2);
        assert_eq!(grid.available_count(), 10);
    }
}
