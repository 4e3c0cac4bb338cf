use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SeatSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SeatPosition {
    Window,
    Middle,
    Aisle,
}

// ============================================================================
// Stored configuration (two accepted shapes)
// ============================================================================

/// Seat configuration as stored on the flight document.
///
/// Older documents carry the flat legacy layout; newer ones list rows
/// explicitly. Both normalise to the same [`SeatMap`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SeatMapConfig {
    RowBased(RowLayout),
    Legacy(LegacyLayout),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RowLayout {
    pub rows: Vec<RowConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RowConfig {
    pub row_number: u32,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub emergency_exit: bool,
    pub cells: Vec<CellConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CellConfig {
    Seat(SeatConfig),
    Aisle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeatConfig {
    pub label: String,
    pub side: SeatSide,
    pub position: SeatPosition,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub special: bool,
}

/// Flat layout: `row_count` rows sharing one column template such as
/// `"ABC-DEF"`, where `-` (or `_`) marks an aisle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyLayout {
    pub row_count: u32,
    pub column_template: String,
    #[serde(default)]
    pub skip_rows: Vec<u32>,
    #[serde(default)]
    pub emergency_rows: Vec<u32>,
}

// ============================================================================
// Canonical in-memory representation
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeatMap {
    pub rows: Vec<SeatRow>,
}

impl SeatMap {
    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.rows.iter().flat_map(|row| row.seats())
    }

    pub fn seat(&self, seat_id: &str) -> Option<&Seat> {
        self.seats().find(|seat| seat.id == seat_id)
    }

    pub fn contains(&self, seat_id: &str) -> bool {
        self.seat(seat_id).is_some()
    }

    pub fn seat_ids(&self) -> Vec<String> {
        self.seats().map(|seat| seat.id.clone()).collect()
    }

    pub fn row(&self, number: u32) -> Option<&SeatRow> {
        self.rows.iter().find(|row| row.number == number)
    }

    pub fn capacity(&self) -> usize {
        self.seats().filter(|seat| !seat.blocked).count()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeatRow {
    pub number: u32,
    pub section: Option<String>,
    pub emergency_exit: bool,
    pub cells: Vec<Cell>,
}

impl SeatRow {
    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.cells.iter().filter_map(|cell| match cell {
            Cell::Seat(seat) => Some(seat),
            Cell::Aisle => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Cell {
    Seat(Seat),
    Aisle,
}

/// An addressable seat; `id` is the row number followed by the label.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: String,
    pub row: u32,
    pub label: String,
    pub side: SeatSide,
    pub position: SeatPosition,
    pub blocked: bool,
    pub premium: bool,
    pub special: bool,
}

impl Seat {
    pub fn seat_id(row: u32, label: &str) -> String {
        format!("{}{}", row, label)
    }
}
