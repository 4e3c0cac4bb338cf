pub mod baggage;
pub mod boarding_pass;
pub mod desk;
pub mod flights;
pub mod manifest;
pub mod roster;
pub mod summary;
pub mod sync;

pub use baggage::{format_tag, BagTagSequence};
pub use boarding_pass::BoardingPass;
pub use desk::CheckinDesk;
pub use flights::FlightManager;
pub use manifest::{parse_manifest_csv, ManifestError, ManifestRow};
pub use roster::{ImportSummary, PassengerRoster};
pub use summary::{FlightSummary, TypeBreakdown};
pub use sync::SyncOutcome;
