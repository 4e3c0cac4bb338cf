pub mod models;
pub mod pii;

pub use models::baggage::{BaggagePiece, BaggageRecord};
pub use models::events::{BoardingEvent, BoardingEventKind};
pub use models::flight::{boarding_percentage, BoardingCounters, Flight, FlightDraft};
pub use models::passenger::{DocumentKey, Gender, Passenger, PassengerType};
pub use models::seat_map::{
    Cell, CellConfig, LegacyLayout, RowConfig, RowLayout, Seat, SeatConfig, SeatMap, SeatMapConfig,
    SeatPosition, SeatRow, SeatSide,
};
