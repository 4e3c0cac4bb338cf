pub mod baggage;
pub mod events;
pub mod flight;
pub mod passenger;
pub mod seat_map;
