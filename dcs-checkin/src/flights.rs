use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use dcs_core::seating;
use dcs_core::{CoreError, CoreResult, IdGenerator, LocalMirror, RemoteRepository, Session};
use dcs_shared::{BoardingCounters, Flight, FlightDraft, SeatMap};
use tracing::{debug, error, info, warn};

/// Owns the flight roster and the active flight of one desk.
///
/// Every change lands in the local mirror first; the remote store is written
/// when the session is online and a failed remote write only leaves a
/// pending marker behind.
pub struct FlightManager {
    remote: RemoteRepository,
    mirror: LocalMirror,
    ids: Arc<dyn IdGenerator>,
    flights: Vec<Flight>,
    active: Option<Flight>,
    seat_map: Option<SeatMap>,
}

impl FlightManager {
    pub fn new(remote: RemoteRepository, mirror: LocalMirror, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            remote,
            mirror,
            ids,
            flights: Vec::new(),
            active: None,
            seat_map: None,
        }
    }

    /// Reloads roster and active flight from the local mirror.
    pub async fn restore(&mut self, session: &Session) -> CoreResult<()> {
        self.flights = self.mirror.flights().await?;

        let active = match session.active_flight_id() {
            Some(id) => match self.mirror.active_flight().await? {
                Some(flight) if flight.id == id => Some(flight),
                _ => self.local_flight(id),
            },
            None => None,
        };
        self.set_active(active);
        Ok(())
    }

    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    pub fn active(&self) -> Option<&Flight> {
        self.active.as_ref()
    }

    /// Normalised seat map of the active flight, if it has one
    pub fn active_seat_map(&self) -> Option<&SeatMap> {
        self.seat_map.as_ref()
    }

    /// The freshest local copy: the active flight wins over its roster entry.
    pub fn flight(&self, id: &str) -> Option<&Flight> {
        self.active
            .as_ref()
            .filter(|f| f.id == id)
            .or_else(|| self.flights.iter().find(|f| f.id == id))
    }

    fn local_flight(&self, id: &str) -> Option<Flight> {
        self.flight(id).cloned()
    }

    fn set_active(&mut self, flight: Option<Flight>) {
        self.seat_map = match flight.as_ref().and_then(|f| f.seat_config.as_ref()) {
            Some(config) => match seating::normalize(config) {
                Ok(map) => Some(map),
                Err(e) => {
                    warn!("Stored seat configuration is unusable: {}", e);
                    None
                }
            },
            None => None,
        };
        self.active = flight;
    }

    /// Replace-or-prepend, newest first.
    fn upsert_roster(&mut self, flight: &Flight) {
        match self.flights.iter_mut().find(|f| f.id == flight.id) {
            Some(existing) => *existing = flight.clone(),
            None => self.flights.insert(0, flight.clone()),
        }
    }

    async fn mark_flight_pending(&self, flight_id: &str) -> CoreResult<()> {
        let mut snapshot = self.mirror.boarding(flight_id).await?;
        snapshot.flight_pending = true;
        snapshot.updated_at = Some(Utc::now());
        self.mirror.set_boarding(&snapshot).await?;
        Ok(())
    }

    async fn persist_active(&self, session: &Session) -> CoreResult<()> {
        self.mirror.set_flights(&self.flights).await?;
        self.mirror.set_active_flight(self.active.as_ref()).await?;
        self.mirror
            .set_active_flight_id(session.active_flight_id())
            .await?;
        Ok(())
    }

    /// Saves the flight form as the active flight.
    ///
    /// Returns `Ok(None)` without touching anything when the form has no
    /// flight number. A new id is assigned only when no flight is active.
    pub async fn save_active_flight(
        &mut self,
        session: &mut Session,
        draft: FlightDraft,
    ) -> CoreResult<Option<String>> {
        if !draft.has_flight_number() {
            debug!("Flight form without flight number ignored");
            return Ok(None);
        }

        let seat_map = draft
            .seat_config
            .as_ref()
            .map(seating::normalize)
            .transpose()?;

        let now = Utc::now();
        let flight = match session.active_flight_id() {
            Some(id) => match self.local_flight(id) {
                Some(mut existing) => {
                    existing.apply_draft(draft, now);
                    existing
                }
                None => Flight::new(id.to_string(), draft, now),
            },
            None => Flight::new(self.ids.flight_id(), draft, now),
        };

        if session.is_online() {
            if let Err(e) = self.remote.save_flight(&flight).await {
                error!("Failed to save flight {} remotely: {}", flight.id, e);
                self.mark_flight_pending(&flight.id).await?;
            }
        } else {
            self.mark_flight_pending(&flight.id).await?;
        }

        let id = flight.id.clone();
        self.upsert_roster(&flight);
        session.activate(&id);
        self.active = Some(flight);
        self.seat_map = seat_map;
        self.persist_active(session).await?;

        info!("Flight {} saved", id);
        Ok(Some(id))
    }

    /// Makes `id` the active flight. A flight that cannot be found anywhere
    /// leaves the current state alone and yields `Ok(None)`.
    pub async fn load_flight(&mut self, session: &mut Session, id: &str) -> CoreResult<Option<Flight>> {
        if self.mirror.pending_deletes().await?.contains(id) {
            warn!("Flight {} was deleted on this device", id);
            return Ok(None);
        }
        let local_pending = self.mirror.boarding(id).await?.flight_pending;

        let found = if session.is_online() && !local_pending {
            match self.remote.get_flight(id).await {
                Ok(Some(flight)) => Some(flight),
                Ok(None) => self.local_flight(id),
                Err(e) => {
                    warn!("Remote lookup of flight {} failed, using local copy: {}", id, e);
                    self.local_flight(id)
                }
            }
        } else {
            self.local_flight(id)
        };

        let Some(flight) = found else {
            warn!("Flight {} not found", id);
            return Ok(None);
        };

        self.upsert_roster(&flight);
        session.activate(&flight.id);
        self.set_active(Some(flight.clone()));
        self.persist_active(session).await?;

        debug!("Flight {} loaded", flight.id);
        Ok(Some(flight))
    }

    /// Removes the flight and all its passengers. Local state always moves
    /// on, whatever happens remotely; a remote delete that did not happen is
    /// remembered and retried by the next sync.
    pub async fn delete_flight(&mut self, session: &mut Session, id: &str) -> CoreResult<()> {
        let deleted_remotely = if session.is_online() {
            match self.remote.delete_flight_cascade(id).await {
                Ok(removed) => {
                    info!("Flight {} deleted with {} passengers", id, removed);
                    true
                }
                Err(e) => {
                    error!("Failed to delete flight {} remotely: {}", id, e);
                    false
                }
            }
        } else {
            warn!("Offline: flight {} deleted on this device only", id);
            false
        };

        let mut pending = self.mirror.pending_deletes().await?;
        let changed = if deleted_remotely {
            pending.remove(id)
        } else {
            pending.insert(id.to_string())
        };
        if changed {
            self.mirror.set_pending_deletes(&pending).await?;
        }

        self.flights.retain(|f| f.id != id);
        self.mirror.set_flights(&self.flights).await?;
        self.mirror.remove_boarding(id).await?;
        self.mirror.remove_passengers(id).await?;

        if session.is_active(id) {
            self.clear_active(session).await?;
        }
        Ok(())
    }

    /// Deselects the active flight.
    pub async fn clear_active(&mut self, session: &mut Session) -> CoreResult<()> {
        session.clear();
        self.set_active(None);
        self.mirror.set_active_flight(None).await?;
        self.mirror.set_active_flight_id(None).await?;
        Ok(())
    }

    /// Merges the remote flight list into the roster. Remote copies win,
    /// except for flights with unsynchronised local changes; flights only
    /// known locally are kept and flights deleted locally stay deleted.
    pub async fn refresh_roster(&mut self, session: &Session) -> CoreResult<()> {
        if !session.is_online() {
            return Ok(());
        }
        let remote = match self.remote.list_flights().await {
            Ok(flights) => flights,
            Err(e) => {
                warn!("Could not refresh flight list: {}", e);
                return Ok(());
            }
        };
        let deleted = self.mirror.pending_deletes().await?;

        let mut merged = Vec::with_capacity(remote.len());
        let mut seen = HashSet::new();
        for flight in remote.into_iter().filter(|f| !deleted.contains(&f.id)) {
            seen.insert(flight.id.clone());
            let keep_local = self.mirror.boarding(&flight.id).await?.flight_pending;
            match self.local_flight(&flight.id) {
                Some(local) if keep_local => merged.push(local),
                _ => merged.push(flight),
            }
        }
        merged.extend(self.flights.iter().filter(|f| !seen.contains(&f.id)).cloned());
        merged.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        if let Some(active_id) = session.active_flight_id() {
            if let Some(fresh) = merged.iter().find(|f| f.id == active_id) {
                if self.active.as_ref() != Some(fresh) {
                    self.set_active(Some(fresh.clone()));
                }
            }
        }

        self.flights = merged;
        self.persist_active(session).await?;
        Ok(())
    }

    /// Records new boarding counters on a flight, locally and then remotely.
    /// Returns whether the remote write went through.
    ///
    /// A flight whose own save is still pending is written in full, so the
    /// remote store never holds a document made of boarding fields only.
    pub async fn update_boarding(
        &mut self,
        session: &Session,
        flight_id: &str,
        counters: BoardingCounters,
        boarded_ids: BTreeSet<String>,
    ) -> CoreResult<bool> {
        let now = Utc::now();
        let mut updated = None;

        if let Some(flight) = self.flights.iter_mut().find(|f| f.id == flight_id) {
            flight.record_boarding(counters, boarded_ids.clone(), now);
            updated = Some(flight.clone());
        }
        if let Some(active) = self.active.as_mut().filter(|f| f.id == flight_id) {
            active.record_boarding(counters, boarded_ids, now);
            updated = Some(active.clone());
        }
        let flight = updated.ok_or_else(|| CoreError::NotFound(format!("Flight {}", flight_id)))?;

        self.mirror.set_flights(&self.flights).await?;
        if session.is_active(flight_id) {
            self.mirror.set_active_flight(Some(&flight)).await?;
        }

        if !session.is_online() {
            return Ok(false);
        }
        let result = if self.mirror.boarding(flight_id).await?.flight_pending {
            self.remote.save_flight(&flight).await
        } else {
            self.remote.update_flight_boarding(&flight).await
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                error!("Failed to update boarding of flight {}: {}", flight_id, e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcs_core::{Collection, Connectivity, DocumentStore, SequentialIdGenerator};
    use dcs_shared::{LegacyLayout, SeatMapConfig};
    use dcs_store::{MemoryDocumentStore, MemoryLocalCache};
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryDocumentStore>,
        mirror: LocalMirror,
        manager: FlightManager,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        let mirror = LocalMirror::new(Arc::new(MemoryLocalCache::new()));
        let manager = FlightManager::new(
            RemoteRepository::new(store.clone()),
            mirror.clone(),
            Arc::new(SequentialIdGenerator::new()),
        );
        Fixture { store, mirror, manager }
    }

    fn draft(number: &str) -> FlightDraft {
        FlightDraft {
            flight_number: number.to_string(),
            origin: "BOG".to_string(),
            destination: "MAD".to_string(),
            aircraft_type: "A320".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_without_flight_number_is_noop() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);

        let result = fx
            .manager
            .save_active_flight(&mut session, draft("  "))
            .await
            .unwrap();

        assert_eq!(result, None);
        assert!(fx.manager.flights().is_empty());
        assert_eq!(session.active_flight_id(), None);
        assert_eq!(fx.store.count(Collection::Flights).await, 0);
        assert_eq!(fx.mirror.active_flight_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_creates_then_updates_active_flight() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);

        let id = fx
            .manager
            .save_active_flight(&mut session, draft("av123"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, "FL-1");
        assert_eq!(session.active_flight_id(), Some("FL-1"));

        let mut edit = draft("AV123");
        edit.gate = Some("B7".to_string());
        let again = fx.manager.save_active_flight(&mut session, edit).await.unwrap();
        assert_eq!(again.as_deref(), Some("FL-1"));

        assert_eq!(fx.manager.flights().len(), 1);
        let remote = fx.store.get(Collection::Flights, "FL-1").await.unwrap().unwrap();
        assert_eq!(remote["gate"], "B7");
        assert_eq!(remote["flightNumber"], "AV123");

        let cached = fx.mirror.active_flight().await.unwrap().unwrap();
        assert_eq!(cached.gate.as_deref(), Some("B7"));
        assert_eq!(fx.mirror.flights().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_seat_config_is_rejected() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);

        let mut bad = draft("AV123");
        bad.seat_config = Some(SeatMapConfig::Legacy(LegacyLayout {
            row_count: 10,
            column_template: String::new(),
            skip_rows: vec![],
            emergency_rows: vec![],
        }));

        let result = fx.manager.save_active_flight(&mut session, bad).await;
        assert!(matches!(result, Err(CoreError::Seating(_))));
        assert!(fx.manager.flights().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_marks_flight_pending() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);
        fx.store.set_available(false);

        let id = fx
            .manager
            .save_active_flight(&mut session, draft("AV123"))
            .await
            .unwrap()
            .unwrap();

        assert!(fx.mirror.boarding(&id).await.unwrap().flight_pending);
        assert_eq!(fx.manager.active().map(|f| f.id.as_str()), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_load_unknown_flight_keeps_state() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);
        fx.manager
            .save_active_flight(&mut session, draft("AV123"))
            .await
            .unwrap();

        let loaded = fx.manager.load_flight(&mut session, "FL-404").await.unwrap();
        assert!(loaded.is_none());
        assert_eq!(session.active_flight_id(), Some("FL-1"));
    }

    #[tokio::test]
    async fn test_load_offline_uses_local_roster() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);
        fx.manager
            .save_active_flight(&mut session, draft("AV123"))
            .await
            .unwrap();
        fx.manager.clear_active(&mut session).await.unwrap();
        fx.manager
            .save_active_flight(&mut session, draft("AV456"))
            .await
            .unwrap();

        session.set_connectivity(Connectivity::Offline);
        let loaded = fx.manager.load_flight(&mut session, "FL-1").await.unwrap().unwrap();
        assert_eq!(loaded.flight_number, "AV123");
        assert_eq!(session.active_flight_id(), Some("FL-1"));
        assert_eq!(fx.mirror.active_flight_id().await.unwrap().as_deref(), Some("FL-1"));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_own_passengers_only() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);
        fx.manager
            .save_active_flight(&mut session, draft("AV123"))
            .await
            .unwrap();

        for (id, flight) in [("P1", "FL-1"), ("P2", "FL-1"), ("P3", "FL-2")] {
            fx.store
                .put(Collection::Passengers, id, json!({"id": id, "flightId": flight}))
                .await
                .unwrap();
        }

        fx.manager.delete_flight(&mut session, "FL-1").await.unwrap();

        assert_eq!(fx.store.count(Collection::Flights).await, 0);
        assert_eq!(fx.store.count(Collection::Passengers).await, 1);
        assert!(fx.store.get(Collection::Passengers, "P3").await.unwrap().is_some());
        assert!(fx.manager.flights().is_empty());
        assert!(fx.manager.active().is_none());
        assert_eq!(session.active_flight_id(), None);
        assert_eq!(fx.mirror.active_flight_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_while_remote_down_still_updates_local() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);
        fx.manager
            .save_active_flight(&mut session, draft("AV123"))
            .await
            .unwrap();
        fx.store.set_available(false);

        fx.manager.delete_flight(&mut session, "FL-1").await.unwrap();

        assert!(fx.manager.flights().is_empty());
        assert!(fx.mirror.flights().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_delete_survives_refresh() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);
        fx.manager
            .save_active_flight(&mut session, draft("AV123"))
            .await
            .unwrap();

        session.set_connectivity(Connectivity::Offline);
        fx.manager.delete_flight(&mut session, "FL-1").await.unwrap();
        assert!(fx.mirror.pending_deletes().await.unwrap().contains("FL-1"));

        session.set_connectivity(Connectivity::Online);
        fx.manager.refresh_roster(&session).await.unwrap();
        assert!(fx.manager.flights().is_empty());
        assert!(fx.manager.load_flight(&mut session, "FL-1").await.unwrap().is_none());
        assert_eq!(session.active_flight_id(), None);

        // A later successful delete settles it
        fx.manager.delete_flight(&mut session, "FL-1").await.unwrap();
        assert!(fx.mirror.pending_deletes().await.unwrap().is_empty());
        assert_eq!(fx.store.count(Collection::Flights).await, 0);
    }

    #[tokio::test]
    async fn test_boarding_update_after_failed_save_writes_whole_flight() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);
        fx.store.set_available(false);
        let id = fx
            .manager
            .save_active_flight(&mut session, draft("AV123"))
            .await
            .unwrap()
            .unwrap();
        fx.store.set_available(true);

        let boarded: BTreeSet<String> = ["P1".to_string()].into_iter().collect();
        let written = fx
            .manager
            .update_boarding(&session, &id, BoardingCounters::compute(2, 1), boarded)
            .await
            .unwrap();
        assert!(written);

        let remote = RemoteRepository::new(fx.store.clone())
            .get_flight(&id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remote.flight_number, "AV123");
        assert_eq!(remote.aircraft_type, "A320");
        assert_eq!(remote.boarding.boarded, 1);
        assert_eq!(remote.boarding.percentage, 50);
    }

    #[tokio::test]
    async fn test_refresh_keeps_local_only_flights() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Offline);
        fx.manager
            .save_active_flight(&mut session, draft("AV123"))
            .await
            .unwrap();

        let other = Flight::new("FL-99".to_string(), draft("IB6500"), Utc::now());
        fx.store
            .put(Collection::Flights, "FL-99", serde_json::to_value(&other).unwrap())
            .await
            .unwrap();

        session.set_connectivity(Connectivity::Online);
        fx.manager.refresh_roster(&session).await.unwrap();

        let ids: Vec<&str> = fx.manager.flights().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"FL-1"));
        assert!(ids.contains(&"FL-99"));
    }

    #[tokio::test]
    async fn test_restore_from_mirror() {
        let mut fx = fixture();
        let mut session = Session::new(Connectivity::Online);
        fx.manager
            .save_active_flight(&mut session, draft("AV123"))
            .await
            .unwrap();

        let restored_session = Session::restore(&fx.mirror, Connectivity::Offline).await.unwrap();
        let mut fresh = FlightManager::new(
            RemoteRepository::new(fx.store.clone()),
            fx.mirror.clone(),
            Arc::new(SequentialIdGenerator::new()),
        );
        fresh.restore(&restored_session).await.unwrap();

        assert_eq!(fresh.active().map(|f| f.flight_number.as_str()), Some("AV123"));
        assert_eq!(fresh.flights().len(), 1);
    }
}
