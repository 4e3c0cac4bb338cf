pub mod cache;
pub mod identity;
pub mod repository;
pub mod rules;
pub mod seating;
pub mod session;

pub use cache::{BoardingSnapshot, CacheError, LocalCache, LocalMirror, Preferences, WeightUnit};
pub use identity::{IdGenerator, SequentialIdGenerator, TimestampIdGenerator};
pub use repository::{
    BoardedFlag, Collection, DocumentStore, RemoteRepository, StoreError, StoreResult, WriteBatch,
    WriteOp,
};
pub use rules::CheckinRules;
pub use seating::{GridCell, GridRow, SeatGrid, SeatStatus, SeatingError};
pub use session::{Connectivity, Session};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Local cache failure: {0}")]
    Cache(#[from] CacheError),
    #[error("Invalid seat map: {0}")]
    Seating(#[from] SeatingError),
    #[error("Manifest rejected: {0}")]
    Manifest(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
