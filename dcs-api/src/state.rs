use std::sync::Arc;

use dcs_checkin::CheckinDesk;
use dcs_core::RemoteRepository;
use tokio::sync::Mutex;

/// Shared by every handler and the connectivity worker. The desk is the
/// single writer: each request holds the lock for its whole operation.
#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<Mutex<CheckinDesk>>,
    /// Used by the connectivity probe without taking the desk lock
    pub remote: RemoteRepository,
}

impl AppState {
    pub fn new(desk: CheckinDesk, remote: RemoteRepository) -> Self {
        Self {
            desk: Arc::new(Mutex::new(desk)),
            remote,
        }
    }
}
