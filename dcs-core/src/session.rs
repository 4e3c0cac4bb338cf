use serde::{Deserialize, Serialize};

use crate::cache::LocalMirror;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    #[default]
    Online,
    Offline,
}

/// Per-client context: which flight the agent is working on and whether the
/// remote store is reachable. Managers receive it by reference.
#[derive(Debug, Clone, Default)]
pub struct Session {
    active_flight_id: Option<String>,
    connectivity: Connectivity,
}

impl Session {
    pub fn new(connectivity: Connectivity) -> Self {
        Self {
            active_flight_id: None,
            connectivity,
        }
    }

    /// Picks up the active flight persisted by a previous run.
    pub async fn restore(mirror: &LocalMirror, connectivity: Connectivity) -> CoreResult<Self> {
        Ok(Self {
            active_flight_id: mirror.active_flight_id().await?,
            connectivity,
        })
    }

    pub fn active_flight_id(&self) -> Option<&str> {
        self.active_flight_id.as_deref()
    }

    pub fn require_active(&self) -> CoreResult<&str> {
        self.active_flight_id()
            .ok_or_else(|| CoreError::ValidationError("No active flight selected".to_string()))
    }

    pub fn activate(&mut self, flight_id: &str) {
        self.active_flight_id = Some(flight_id.to_string());
    }

    pub fn clear(&mut self) {
        self.active_flight_id = None;
    }

    pub fn is_active(&self, flight_id: &str) -> bool {
        self.active_flight_id() == Some(flight_id)
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity == Connectivity::Online
    }

    /// Returns `true` when this call brings the session back online.
    pub fn set_connectivity(&mut self, connectivity: Connectivity) -> bool {
        let regained = self.connectivity == Connectivity::Offline && connectivity == Connectivity::Online;
        self.connectivity = connectivity;
        regained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_flight_lifecycle() {
        let mut session = Session::new(Connectivity::Online);
        assert!(session.require_active().is_err());

        session.activate("FL-1");
        assert_eq!(session.require_active().unwrap(), "FL-1");
        assert!(session.is_active("FL-1"));

        session.clear();
        assert_eq!(session.active_flight_id(), None);
    }

    #[test]
    fn test_connectivity_regained() {
        let mut session = Session::new(Connectivity::Online);
        assert!(!session.set_connectivity(Connectivity::Online));
        assert!(!session.set_connectivity(Connectivity::Offline));
        assert!(!session.is_online());
        assert!(session.set_connectivity(Connectivity::Online));
    }
}
