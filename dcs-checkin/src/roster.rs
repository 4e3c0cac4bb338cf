use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use dcs_core::{
    CheckinRules, CoreError, CoreResult, IdGenerator, LocalMirror, RemoteRepository, Session,
};
use dcs_shared::pii::Masked;
use dcs_shared::{
    BoardingCounters, BoardingEvent, BoardingEventKind, DocumentKey, Passenger,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::baggage::BagTagSequence;
use crate::boarding_pass::BoardingPass;
use crate::flights::FlightManager;
use crate::manifest::ManifestRow;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub total: u32,
    pub new: u32,
    pub updated: u32,
}

/// What still has to reach the remote store when a passenger write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingWrite {
    Document,
    BoardedFlag,
}

/// Passengers of the active flight.
///
/// The checked-in subset is derived from the roster, so a passenger can
/// never appear in it twice; it is still mirrored under its own key for
/// readers that only want the checked-in list.
pub struct PassengerRoster {
    pub(crate) remote: RemoteRepository,
    pub(crate) mirror: LocalMirror,
    ids: Arc<dyn IdGenerator>,
    rules: CheckinRules,
    tags: BagTagSequence,
    pub(crate) flight_id: Option<String>,
    pub(crate) passengers: Vec<Passenger>,
    events: Option<broadcast::Sender<BoardingEvent>>,
}

impl PassengerRoster {
    pub fn new(
        remote: RemoteRepository,
        mirror: LocalMirror,
        ids: Arc<dyn IdGenerator>,
        rules: CheckinRules,
    ) -> Self {
        Self {
            tags: BagTagSequence::new(mirror.clone()),
            remote,
            mirror,
            ids,
            rules,
            flight_id: None,
            passengers: Vec::new(),
            events: None,
        }
    }

    /// Publish a [`BoardingEvent`] for every passenger state change.
    pub fn with_events(mut self, sender: broadcast::Sender<BoardingEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn rules(&self) -> &CheckinRules {
        &self.rules
    }

    pub fn flight_id(&self) -> Option<&str> {
        self.flight_id.as_deref()
    }

    pub fn passengers(&self) -> &[Passenger] {
        &self.passengers
    }

    pub fn passenger(&self, id: &str) -> Option<&Passenger> {
        self.passengers.iter().find(|p| p.id == id)
    }

    pub fn checked_in(&self) -> Vec<&Passenger> {
        self.passengers.iter().filter(|p| p.checked_in).collect()
    }

    fn checked_in_owned(&self) -> Vec<Passenger> {
        self.passengers.iter().filter(|p| p.checked_in).cloned().collect()
    }

    fn sort(&mut self) {
        self.passengers.sort_by(|a, b| {
            (a.last_name.to_uppercase(), a.first_name.to_uppercase())
                .cmp(&(b.last_name.to_uppercase(), b.first_name.to_uppercase()))
        });
    }

    fn index_of(&self, passenger_id: &str) -> CoreResult<usize> {
        self.passengers
            .iter()
            .position(|p| p.id == passenger_id)
            .ok_or_else(|| CoreError::NotFound(format!("Passenger {}", passenger_id)))
    }

    /// The active flight, provided its passengers are the ones loaded.
    fn loaded_flight(&self, session: &Session) -> CoreResult<String> {
        let active = session.require_active()?;
        if self.flight_id.as_deref() != Some(active) {
            return Err(CoreError::ValidationError(format!(
                "Passengers of flight {} are not loaded",
                active
            )));
        }
        Ok(active.to_string())
    }

    /// Loads the passenger list of `flight_id`: remote when online, the local
    /// snapshot otherwise. Passengers with unsynchronised local changes keep
    /// their local version.
    pub async fn load_for_flight(&mut self, session: &Session, flight_id: &str) -> CoreResult<()> {
        let snapshot = self.mirror.boarding(flight_id).await?;
        let local = match self.mirror.passengers(flight_id).await? {
            Some(list) => list,
            None => self
                .mirror
                .checked_in()
                .await?
                .into_iter()
                .filter(|p| p.flight_id == flight_id)
                .collect(),
        };

        let passengers = if session.is_online() {
            match self.remote.passengers_for_flight(flight_id).await {
                Ok(mut remote) => {
                    let pending = local.into_iter().filter(|p| {
                        snapshot.pending_upserts.contains(&p.id)
                            || snapshot.pending_flags.contains(&p.id)
                    });
                    for passenger in pending {
                        match remote.iter_mut().find(|r| r.id == passenger.id) {
                            Some(slot) => *slot = passenger,
                            None => remote.push(passenger),
                        }
                    }
                    remote
                }
                Err(e) => {
                    warn!("Could not load passengers of {} remotely, using local copy: {}", flight_id, e);
                    local
                }
            }
        } else {
            local
        };

        self.flight_id = Some(flight_id.to_string());
        self.passengers = passengers;
        self.sort();
        self.persist_local(flight_id).await?;

        debug!("Loaded {} passengers for flight {}", self.passengers.len(), flight_id);
        Ok(())
    }

    /// Forgets the loaded flight.
    pub async fn clear(&mut self) -> CoreResult<()> {
        self.flight_id = None;
        self.passengers.clear();
        self.mirror.set_checked_in(&[]).await?;
        Ok(())
    }

    async fn persist_local(&self, flight_id: &str) -> CoreResult<()> {
        self.mirror.set_passengers(flight_id, &self.passengers).await?;
        self.mirror.set_checked_in(&self.checked_in_owned()).await?;
        Ok(())
    }

    fn counters(&self) -> (BoardingCounters, BTreeSet<String>) {
        let checked_in = self.passengers.iter().filter(|p| p.checked_in).count() as u32;
        let boarded: BTreeSet<String> = self
            .passengers
            .iter()
            .filter(|p| p.checked_in && p.boarded)
            .map(|p| p.id.clone())
            .collect();
        (
            BoardingCounters::compute(checked_in, boarded.len() as u32),
            boarded,
        )
    }

    /// Local first, then remote. Remote failures (or being offline) leave
    /// the affected passengers in the pending marker for the next sync.
    async fn commit(
        &mut self,
        session: &Session,
        flights: &mut FlightManager,
        changed: &[Passenger],
        write: PendingWrite,
        event: Option<BoardingEventKind>,
    ) -> CoreResult<()> {
        let flight_id = self.loaded_flight(session)?;
        self.persist_local(&flight_id).await?;

        let mut snapshot = self.mirror.boarding(&flight_id).await?;
        let (counters, boarded) = self.counters();
        snapshot.boarded_ids = boarded.clone();
        snapshot.updated_at = Some(Utc::now());

        // A full save inside update_boarding settles an earlier pending save
        snapshot.flight_pending = !flights
            .update_boarding(session, &flight_id, counters, boarded)
            .await?;

        if !changed.is_empty() {
            let written = if session.is_online() {
                match self.remote.upsert_passengers(changed).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!("Failed to write {} passenger(s) remotely: {}", changed.len(), e);
                        false
                    }
                }
            } else {
                false
            };

            for passenger in changed {
                if written {
                    snapshot.pending_upserts.remove(&passenger.id);
                    snapshot.pending_flags.remove(&passenger.id);
                } else {
                    match write {
                        PendingWrite::Document => snapshot.pending_upserts.insert(passenger.id.clone()),
                        PendingWrite::BoardedFlag => snapshot.pending_flags.insert(passenger.id.clone()),
                    };
                }
            }
        }

        self.mirror.set_boarding(&snapshot).await?;

        if let (Some(kind), Some(sender)) = (event, &self.events) {
            for passenger in changed {
                // No subscribers is fine
                let _ = sender.send(BoardingEvent::new(
                    &flight_id,
                    &passenger.id,
                    kind,
                    passenger.seat.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Checks a passenger in on `seat` with one bag per entry of `weights`
    /// (kilograms).
    pub async fn check_in(
        &mut self,
        session: &Session,
        flights: &mut FlightManager,
        passenger_id: &str,
        seat: Option<&str>,
        weights: &[f64],
    ) -> CoreResult<Passenger> {
        self.loaded_flight(session)?;
        let idx = self.index_of(passenger_id)?;

        let seat = seat
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::ValidationError("A seat is required for check-in".to_string()))?;

        if self.passengers[idx].checked_in {
            return Err(CoreError::Conflict(format!(
                "Passenger {} is already checked in",
                passenger_id
            )));
        }

        if let Some(map) = flights.active_seat_map() {
            match map.seat(&seat) {
                None => {
                    return Err(CoreError::ValidationError(format!(
                        "Seat {} does not exist on this aircraft",
                        seat
                    )))
                }
                Some(s) if s.blocked => {
                    return Err(CoreError::ValidationError(format!("Seat {} is blocked", seat)))
                }
                Some(_) => {}
            }
        }

        let taken = self
            .passengers
            .iter()
            .any(|p| p.id != passenger_id && p.checked_in && p.seat.as_deref() == Some(seat.as_str()));
        if taken {
            return Err(CoreError::Conflict(format!("Seat {} is already taken", seat)));
        }

        let flight = flights
            .active()
            .cloned()
            .ok_or_else(|| CoreError::ValidationError("No active flight selected".to_string()))?;
        let baggage = self.tags.tag_all(&flight, weights, &self.rules).await?;

        let now = Utc::now();
        let passenger = &mut self.passengers[idx];
        passenger.checked_in = true;
        passenger.check_in_time = Some(now);
        passenger.seat = Some(seat);
        passenger.baggage = baggage;
        passenger.updated_at = now;
        let passenger = passenger.clone();

        self.commit(
            session,
            flights,
            std::slice::from_ref(&passenger),
            PendingWrite::Document,
            Some(BoardingEventKind::CheckedIn),
        )
        .await?;

        info!(
            "Checked in {} on seat {} with {} bag(s)",
            passenger.id,
            passenger.seat.as_deref().unwrap_or("-"),
            passenger.baggage.count
        );
        Ok(passenger)
    }

    /// Reverts a check-in: seat, bags, boarding state and boarding pass go.
    pub async fn un_check_in(
        &mut self,
        session: &Session,
        flights: &mut FlightManager,
        passenger_id: &str,
    ) -> CoreResult<Passenger> {
        self.loaded_flight(session)?;
        let idx = self.index_of(passenger_id)?;
        if !self.passengers[idx].checked_in {
            return Err(CoreError::ValidationError(format!(
                "Passenger {} is not checked in",
                passenger_id
            )));
        }

        self.passengers[idx].revert_check_in(Utc::now());
        let passenger = self.passengers[idx].clone();

        self.commit(
            session,
            flights,
            std::slice::from_ref(&passenger),
            PendingWrite::Document,
            Some(BoardingEventKind::CheckInReverted),
        )
        .await?;

        info!("Check-in of {} reverted", passenger.id);
        Ok(passenger)
    }

    pub async fn board(
        &mut self,
        session: &Session,
        flights: &mut FlightManager,
        passenger_id: &str,
    ) -> CoreResult<Passenger> {
        self.loaded_flight(session)?;
        let idx = self.index_of(passenger_id)?;
        let passenger = &self.passengers[idx];
        if !passenger.checked_in {
            return Err(CoreError::ValidationError(format!(
                "Passenger {} must be checked in before boarding",
                passenger_id
            )));
        }
        if passenger.boarded {
            return Ok(passenger.clone());
        }

        let now = Utc::now();
        let passenger = &mut self.passengers[idx];
        passenger.boarded = true;
        passenger.boarded_time = Some(now);
        passenger.updated_at = now;
        let passenger = passenger.clone();

        self.commit(
            session,
            flights,
            std::slice::from_ref(&passenger),
            PendingWrite::BoardedFlag,
            Some(BoardingEventKind::Boarded),
        )
        .await?;
        Ok(passenger)
    }

    pub async fn unboard(
        &mut self,
        session: &Session,
        flights: &mut FlightManager,
        passenger_id: &str,
    ) -> CoreResult<Passenger> {
        self.loaded_flight(session)?;
        let idx = self.index_of(passenger_id)?;
        if !self.passengers[idx].boarded {
            return Ok(self.passengers[idx].clone());
        }

        let passenger = &mut self.passengers[idx];
        passenger.boarded = false;
        passenger.boarded_time = None;
        passenger.updated_at = Utc::now();
        let passenger = passenger.clone();

        self.commit(
            session,
            flights,
            std::slice::from_ref(&passenger),
            PendingWrite::BoardedFlag,
            Some(BoardingEventKind::Unboarded),
        )
        .await?;
        Ok(passenger)
    }

    /// Boards every checked-in passenger not yet boarded. Returns how many.
    pub async fn board_all_pending(
        &mut self,
        session: &Session,
        flights: &mut FlightManager,
    ) -> CoreResult<usize> {
        self.loaded_flight(session)?;
        let now = Utc::now();
        let mut changed = Vec::new();
        for passenger in self.passengers.iter_mut().filter(|p| p.is_pending_boarding()) {
            passenger.boarded = true;
            passenger.boarded_time = Some(now);
            passenger.updated_at = now;
            changed.push(passenger.clone());
        }

        self.commit(
            session,
            flights,
            &changed,
            PendingWrite::BoardedFlag,
            Some(BoardingEventKind::Boarded),
        )
        .await?;

        info!("Boarded {} pending passenger(s)", changed.len());
        Ok(changed.len())
    }

    /// Unboards everyone on the flight. Returns how many were boarded.
    pub async fn reset_boarding(
        &mut self,
        session: &Session,
        flights: &mut FlightManager,
    ) -> CoreResult<usize> {
        self.loaded_flight(session)?;
        let now = Utc::now();
        let mut changed = Vec::new();
        for passenger in self.passengers.iter_mut().filter(|p| p.boarded) {
            passenger.boarded = false;
            passenger.boarded_time = None;
            passenger.updated_at = now;
            changed.push(passenger.clone());
        }

        self.commit(
            session,
            flights,
            &changed,
            PendingWrite::BoardedFlag,
            Some(BoardingEventKind::Unboarded),
        )
        .await?;

        warn!("Boarding reset: {} passenger(s) unboarded", changed.len());
        Ok(changed.len())
    }

    /// Merges manifest rows into the roster, matching on document type and
    /// number. Matched passengers keep seat, check-in, boarding, boarding
    /// pass and baggage; only descriptive fields are overwritten.
    pub async fn import_manifest(
        &mut self,
        session: &Session,
        flights: &mut FlightManager,
        rows: Vec<ManifestRow>,
    ) -> CoreResult<ImportSummary> {
        let flight_id = self.loaded_flight(session)?;
        let mut index: HashMap<DocumentKey, usize> = self
            .passengers
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.document_key(), idx))
            .collect();

        let now = Utc::now();
        let mut summary = ImportSummary::default();
        let mut touched = BTreeSet::new();

        for row in rows {
            summary.total += 1;
            let document_type = row
                .document_type
                .unwrap_or_else(|| self.rules.default_document_type.clone());
            let key = DocumentKey::new(&document_type, &row.document_number);

            let idx = match index.get(&key) {
                Some(&idx) => {
                    summary.updated += 1;
                    idx
                }
                None => {
                    summary.new += 1;
                    let id = self.ids.passenger_id();
                    debug!(document = %Masked(&key.document_number), "New passenger {}", id);
                    self.passengers.push(Passenger {
                        id,
                        flight_id: flight_id.clone(),
                        first_name: String::new(),
                        last_name: String::new(),
                        document_type: String::new(),
                        document_number: String::new(),
                        ticket_number: None,
                        passenger_type: Default::default(),
                        gender: None,
                        seat: None,
                        baggage: Default::default(),
                        checked_in: false,
                        check_in_time: None,
                        boarded: false,
                        boarded_time: None,
                        boarding_pass_ref: None,
                        updated_at: now,
                    });
                    let idx = self.passengers.len() - 1;
                    index.insert(key.clone(), idx);
                    idx
                }
            };

            let passenger = &mut self.passengers[idx];
            passenger.first_name = row.first_name;
            passenger.last_name = row.last_name;
            passenger.document_type = key.document_type;
            passenger.document_number = key.document_number;
            passenger.ticket_number = row.ticket_number;
            passenger.passenger_type = row.passenger_type;
            passenger.gender = row.gender;
            passenger.updated_at = now;
            touched.insert(idx);
        }

        let changed: Vec<Passenger> = touched
            .into_iter()
            .map(|idx| self.passengers[idx].clone())
            .collect();
        self.sort();

        self.commit(session, flights, &changed, PendingWrite::Document, None)
            .await?;

        info!(
            "Manifest imported for {}: {} rows, {} new, {} updated",
            flight_id, summary.total, summary.new, summary.updated
        );
        Ok(summary)
    }

    /// Issues a boarding pass and stores its reference on the passenger.
    pub async fn issue_boarding_pass(
        &mut self,
        session: &Session,
        flights: &mut FlightManager,
        passenger_id: &str,
    ) -> CoreResult<BoardingPass> {
        self.loaded_flight(session)?;
        let idx = self.index_of(passenger_id)?;
        let flight = flights
            .active()
            .cloned()
            .ok_or_else(|| CoreError::ValidationError("No active flight selected".to_string()))?;

        let mut order: Vec<&Passenger> = self.checked_in();
        order.sort_by(|a, b| (a.check_in_time, &a.id).cmp(&(b.check_in_time, &b.id)));
        let sequence = order
            .iter()
            .position(|p| p.id == passenger_id)
            .map(|pos| pos as u32 + 1)
            .unwrap_or(0);

        let pass = BoardingPass::issue(&flight, &self.passengers[idx], sequence)?;

        let passenger = &mut self.passengers[idx];
        passenger.boarding_pass_ref = Some(pass.reference.clone());
        passenger.updated_at = Utc::now();
        let passenger = passenger.clone();

        self.commit(
            session,
            flights,
            std::slice::from_ref(&passenger),
            PendingWrite::Document,
            None,
        )
        .await?;

        debug!("Boarding pass {} issued", pass.reference);
        Ok(pass)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use dcs_core::{Collection, Connectivity, DocumentStore, SequentialIdGenerator};
    use dcs_shared::{FlightDraft, LegacyLayout, PassengerType, SeatMapConfig};
    use dcs_store::{MemoryDocumentStore, MemoryLocalCache};

    pub(crate) struct Fixture {
        pub store: Arc<MemoryDocumentStore>,
        pub mirror: LocalMirror,
        pub session: Session,
        pub flights: FlightManager,
        pub roster: PassengerRoster,
    }

    pub(crate) fn row(last: &str, first: &str, document: &str) -> ManifestRow {
        ManifestRow {
            first_name: first.to_string(),
            last_name: last.to_string(),
            document_type: None,
            document_number: document.to_string(),
            ticket_number: None,
            passenger_type: PassengerType::Adult,
            gender: None,
        }
    }

    /// Active flight AV123 (30 rows, ABC-DEF) with the given manifest loaded.
    pub(crate) async fn fixture(rows: Vec<ManifestRow>) -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        let mirror = LocalMirror::new(Arc::new(MemoryLocalCache::new()));
        let ids: Arc<dyn IdGenerator> = Arc::new(SequentialIdGenerator::new());
        let remote = RemoteRepository::new(store.clone());

        let mut session = Session::new(Connectivity::Online);
        let mut flights = FlightManager::new(remote.clone(), mirror.clone(), ids.clone());
        let mut roster = PassengerRoster::new(remote, mirror.clone(), ids, CheckinRules::default());

        let draft = FlightDraft {
            flight_number: "AV123".to_string(),
            origin: "BOG".to_string(),
            destination: "MAD".to_string(),
            seat_config: Some(SeatMapConfig::Legacy(LegacyLayout {
                row_count: 30,
                column_template: "ABC-DEF".to_string(),
                skip_rows: vec![13],
                emergency_rows: vec![],
            })),
            ..Default::default()
        };
        let flight_id = flights
            .save_active_flight(&mut session, draft)
            .await
            .unwrap()
            .unwrap();
        roster.load_for_flight(&session, &flight_id).await.unwrap();
        if !rows.is_empty() {
            roster
                .import_manifest(&session, &mut flights, rows)
                .await
                .unwrap();
        }

        Fixture {
            store,
            mirror,
            session,
            flights,
            roster,
        }
    }

    fn id_of(fx: &Fixture, last: &str) -> String {
        fx.roster
            .passengers()
            .iter()
            .find(|p| p.last_name == last)
            .map(|p| p.id.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn test_check_in_smith() {
        let mut fx = fixture(vec![row("SMITH", "JOHN", "AB123")]).await;
        let id = id_of(&fx, "SMITH");

        let passenger = fx
            .roster
            .check_in(&fx.session, &mut fx.flights, &id, Some("14c"), &[20.0])
            .await
            .unwrap();

        assert!(passenger.checked_in);
        assert!(passenger.check_in_time.is_some());
        assert_eq!(passenger.seat.as_deref(), Some("14C"));
        assert_eq!(passenger.baggage.count, 1);
        assert_eq!(passenger.baggage.total_weight, 20.0);
        assert_eq!(passenger.baggage.pieces[0].tag, "AV123/MAD/0001");

        let subset = fx.roster.checked_in();
        assert_eq!(subset.iter().filter(|p| p.id == id).count(), 1);
        let cached = fx.mirror.checked_in().await.unwrap();
        assert_eq!(cached.iter().filter(|p| p.id == id).count(), 1);

        let remote = fx.store.get(Collection::Passengers, &id).await.unwrap().unwrap();
        assert_eq!(remote["seat"], "14C");
        assert_eq!(remote["checkedIn"], true);

        let flight = fx.flights.active().unwrap();
        assert_eq!(flight.boarding.checked_in, 1);
        assert_eq!(flight.boarding.percentage, 0);
    }

    #[tokio::test]
    async fn test_check_in_then_revert_restores_state() {
        let mut fx = fixture(vec![row("SMITH", "JOHN", "AB123")]).await;
        let id = id_of(&fx, "SMITH");
        let before = fx.roster.passenger(&id).unwrap().clone();

        fx.roster
            .check_in(&fx.session, &mut fx.flights, &id, Some("14C"), &[20.0])
            .await
            .unwrap();
        fx.roster
            .board(&fx.session, &mut fx.flights, &id)
            .await
            .unwrap();
        let after = fx
            .roster
            .un_check_in(&fx.session, &mut fx.flights, &id)
            .await
            .unwrap();

        assert!(!after.checked_in);
        assert!(!after.boarded);
        assert_eq!(after.seat, None);
        assert_eq!(after.check_in_time, None);
        assert!(after.baggage.is_empty());
        assert_eq!(
            Passenger { updated_at: before.updated_at, ..after.clone() },
            before
        );
        assert!(fx.roster.checked_in().is_empty());
        assert_eq!(fx.flights.active().unwrap().boarding.checked_in, 0);
    }

    #[tokio::test]
    async fn test_check_in_validation() {
        let mut fx = fixture(vec![row("SMITH", "JOHN", "AB1"), row("DOE", "JANE", "AB2")]).await;
        let smith = id_of(&fx, "SMITH");
        let doe = id_of(&fx, "DOE");

        // Seat required
        let err = fx
            .roster
            .check_in(&fx.session, &mut fx.flights, &smith, None, &[])
            .await;
        assert!(matches!(err, Err(CoreError::ValidationError(_))));

        // Row 13 is skipped, row 40 does not exist
        for seat in ["13A", "40A", "12G"] {
            let err = fx
                .roster
                .check_in(&fx.session, &mut fx.flights, &smith, Some(seat), &[])
                .await;
            assert!(matches!(err, Err(CoreError::ValidationError(_))), "{seat}");
        }

        // Overweight bag
        let err = fx
            .roster
            .check_in(&fx.session, &mut fx.flights, &smith, Some("1A"), &[40.0])
            .await;
        assert!(matches!(err, Err(CoreError::ValidationError(_))));
        assert!(!fx.roster.passenger(&smith).unwrap().checked_in);

        fx.roster
            .check_in(&fx.session, &mut fx.flights, &smith, Some("1A"), &[])
            .await
            .unwrap();

        // Seat held by someone else
        let err = fx
            .roster
            .check_in(&fx.session, &mut fx.flights, &doe, Some("1A"), &[])
            .await;
        assert!(matches!(err, Err(CoreError::Conflict(_))));

        let err = fx
            .roster
            .check_in(&fx.session, &mut fx.flights, &smith, Some("2A"), &[])
            .await;
        assert!(matches!(err, Err(CoreError::Conflict(_))));

        let err = fx
            .roster
            .check_in(&fx.session, &mut fx.flights, "PX-404", Some("2A"), &[])
            .await;
        assert!(matches!(err, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_board_requires_check_in() {
        let mut fx = fixture(vec![row("SMITH", "JOHN", "AB1")]).await;
        let id = id_of(&fx, "SMITH");
        let err = fx.roster.board(&fx.session, &mut fx.flights, &id).await;
        assert!(matches!(err, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_board_all_pending() {
        let names = ["A", "B", "C", "D", "E"];
        let rows = names.iter().map(|n| row(n, "X", &format!("DOC{n}"))).collect();
        let mut fx = fixture(rows).await;

        for (i, name) in names.iter().enumerate() {
            let id = id_of(&fx, name);
            let seat = format!("{}A", i + 1);
            fx.roster
                .check_in(&fx.session, &mut fx.flights, &id, Some(&seat), &[])
                .await
                .unwrap();
        }
        for name in ["A", "B"] {
            let id = id_of(&fx, name);
            fx.roster.board(&fx.session, &mut fx.flights, &id).await.unwrap();
        }

        let boarded = fx
            .roster
            .board_all_pending(&fx.session, &mut fx.flights)
            .await
            .unwrap();
        assert_eq!(boarded, 3);

        let counters = fx.flights.active().unwrap().boarding;
        assert_eq!(counters.boarded, 5);
        assert_eq!(counters.pending(), 0);
        assert_eq!(counters.percentage, 100);
        assert_eq!(fx.flights.active().unwrap().boarded_passenger_ids.len(), 5);

        let reset = fx
            .roster
            .reset_boarding(&fx.session, &mut fx.flights)
            .await
            .unwrap();
        assert_eq!(reset, 5);
        assert_eq!(fx.flights.active().unwrap().boarding.percentage, 0);
    }

    #[tokio::test]
    async fn test_manifest_reimport_is_idempotent() {
        let rows = vec![row("SMITH", "JOHN", "AB 123"), row("DOE", "JANE", "CD456")];
        let mut fx = fixture(rows.clone()).await;
        let smith = id_of(&fx, "SMITH");

        fx.roster
            .check_in(&fx.session, &mut fx.flights, &smith, Some("14C"), &[20.0])
            .await
            .unwrap();
        fx.roster.board(&fx.session, &mut fx.flights, &smith).await.unwrap();
        fx.roster
            .issue_boarding_pass(&fx.session, &mut fx.flights, &smith)
            .await
            .unwrap();
        let before = fx.roster.passenger(&smith).unwrap().clone();

        // Same people, document number spaced differently and a name fix
        let mut again = rows.clone();
        again[0] = row("SMITH", "JOHNNY", "ab123");
        let summary = fx
            .roster
            .import_manifest(&fx.session, &mut fx.flights, again)
            .await
            .unwrap();

        assert_eq!(summary, ImportSummary { total: 2, new: 0, updated: 2 });
        assert_eq!(fx.roster.passengers().len(), 2);

        let after = fx.roster.passenger(&smith).unwrap();
        assert_eq!(after.first_name, "JOHNNY");
        assert_eq!(after.seat, before.seat);
        assert_eq!(after.checked_in, before.checked_in);
        assert_eq!(after.check_in_time, before.check_in_time);
        assert_eq!(after.boarded, before.boarded);
        assert_eq!(after.boarded_time, before.boarded_time);
        assert_eq!(after.boarding_pass_ref, before.boarding_pass_ref);
        assert_eq!(after.baggage, before.baggage);
        assert_eq!(fx.store.count(Collection::Passengers).await, 2);
    }

    #[tokio::test]
    async fn test_offline_check_in_is_marked_pending() {
        let mut fx = fixture(vec![row("SMITH", "JOHN", "AB1")]).await;
        let id = id_of(&fx, "SMITH");
        fx.session.set_connectivity(Connectivity::Offline);

        fx.roster
            .check_in(&fx.session, &mut fx.flights, &id, Some("3C"), &[])
            .await
            .unwrap();

        let snapshot = fx.mirror.boarding(fx.roster.flight_id().unwrap()).await.unwrap();
        assert!(snapshot.pending_upserts.contains(&id));
        assert!(snapshot.flight_pending);
        assert!(fx.roster.passenger(&id).unwrap().checked_in);

        let remote = fx.store.get(Collection::Passengers, &id).await.unwrap().unwrap();
        assert_eq!(remote["checkedIn"], false);
    }

    #[tokio::test]
    async fn test_remote_failure_on_board_records_flag() {
        let mut fx = fixture(vec![row("SMITH", "JOHN", "AB1")]).await;
        let id = id_of(&fx, "SMITH");
        fx.roster
            .check_in(&fx.session, &mut fx.flights, &id, Some("3C"), &[])
            .await
            .unwrap();

        fx.store.set_available(false);
        fx.roster.board(&fx.session, &mut fx.flights, &id).await.unwrap();

        let snapshot = fx.mirror.boarding(fx.roster.flight_id().unwrap()).await.unwrap();
        assert!(snapshot.pending_flags.contains(&id));
        assert!(snapshot.boarded_ids.contains(&id));
        assert!(fx.roster.passenger(&id).unwrap().boarded);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let mut fx = fixture(vec![row("SMITH", "JOHN", "AB1")]).await;
        let (tx, mut rx) = broadcast::channel(16);
        let roster = std::mem::replace(
            &mut fx.roster,
            PassengerRoster::new(
                RemoteRepository::new(fx.store.clone()),
                fx.mirror.clone(),
                Arc::new(SequentialIdGenerator::new()),
                CheckinRules::default(),
            ),
        );
        fx.roster = roster.with_events(tx);
        let id = id_of(&fx, "SMITH");

        fx.roster
            .check_in(&fx.session, &mut fx.flights, &id, Some("3C"), &[])
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.passenger_id, id);
        assert_eq!(event.kind, BoardingEventKind::CheckedIn);
        assert_eq!(event.seat.as_deref(), Some("3C"));
    }
}
