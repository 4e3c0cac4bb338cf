use std::io::Read;
use std::sync::Arc;

use dcs_core::seating;
use dcs_core::{
    CheckinRules, Connectivity, CoreError, CoreResult, DocumentStore, IdGenerator, LocalCache,
    LocalMirror, Preferences, RemoteRepository, SeatGrid, Session,
};
use dcs_shared::{BoardingEvent, Flight, FlightDraft, Passenger};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::boarding_pass::BoardingPass;
use crate::flights::FlightManager;
use crate::manifest::{parse_manifest_csv, ManifestRow};
use crate::roster::{ImportSummary, PassengerRoster};
use crate::summary::FlightSummary;
use crate::sync::SyncOutcome;

const EVENT_BUFFER: usize = 256;

/// One check-in workstation: session, flights and the passengers of the
/// active flight, wired to the remote store and the local cache.
pub struct CheckinDesk {
    session: Session,
    flights: FlightManager,
    roster: PassengerRoster,
    mirror: LocalMirror,
    events: broadcast::Sender<BoardingEvent>,
}

impl CheckinDesk {
    /// Opens the desk, restoring whatever the local cache remembers.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn LocalCache>,
        ids: Arc<dyn IdGenerator>,
        rules: CheckinRules,
        connectivity: Connectivity,
    ) -> CoreResult<Self> {
        let remote = RemoteRepository::new(store);
        let mirror = LocalMirror::new(cache);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let mut session = Session::restore(&mirror, connectivity).await?;
        let mut flights = FlightManager::new(remote.clone(), mirror.clone(), ids.clone());
        flights.restore(&session).await?;
        flights.refresh_roster(&session).await?;

        let mut roster = PassengerRoster::new(remote, mirror.clone(), ids, rules)
            .with_events(events.clone());

        if let Some(id) = session.active_flight_id().map(str::to_string) {
            if flights.active().is_some() {
                roster.load_for_flight(&session, &id).await?;
            } else {
                warn!("Active flight {} is no longer known, clearing it", id);
                flights.clear_active(&mut session).await?;
            }
        }

        info!(
            "Desk opened ({:?}), active flight: {}",
            session.connectivity(),
            session.active_flight_id().unwrap_or("none")
        );
        Ok(Self {
            session,
            flights,
            roster,
            mirror,
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardingEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn flights(&self) -> &[Flight] {
        self.flights.flights()
    }

    pub fn active_flight(&self) -> Option<&Flight> {
        self.flights.active()
    }

    pub fn passengers(&self) -> &[Passenger] {
        self.roster.passengers()
    }

    pub fn checked_in(&self) -> Vec<&Passenger> {
        self.roster.checked_in()
    }

    pub fn passenger(&self, id: &str) -> Option<&Passenger> {
        self.roster.passenger(id)
    }

    // ------------------------------------------------------------------
    // Flights
    // ------------------------------------------------------------------

    pub async fn save_active_flight(&mut self, draft: FlightDraft) -> CoreResult<Option<String>> {
        let saved = self
            .flights
            .save_active_flight(&mut self.session, draft)
            .await?;
        if let Some(id) = &saved {
            if self.roster.flight_id() != Some(id.as_str()) {
                self.roster.load_for_flight(&self.session, id).await?;
            }
        }
        Ok(saved)
    }

    /// Deselects the current flight and saves the form as a new one.
    pub async fn create_flight(&mut self, draft: FlightDraft) -> CoreResult<Option<String>> {
        if !draft.has_flight_number() {
            return Ok(None);
        }
        self.flights.clear_active(&mut self.session).await?;
        self.roster.clear().await?;
        self.save_active_flight(draft).await
    }

    pub async fn load_flight(&mut self, id: &str) -> CoreResult<Option<Flight>> {
        let loaded = self.flights.load_flight(&mut self.session, id).await?;
        if loaded.is_some() {
            self.roster.load_for_flight(&self.session, id).await?;
        }
        Ok(loaded)
    }

    pub async fn delete_flight(&mut self, id: &str) -> CoreResult<()> {
        let was_active = self.session.is_active(id);
        self.flights.delete_flight(&mut self.session, id).await?;
        if was_active {
            self.roster.clear().await?;
        }
        Ok(())
    }

    pub async fn refresh_flights(&mut self) -> CoreResult<()> {
        self.flights.refresh_roster(&self.session).await
    }

    // ------------------------------------------------------------------
    // Passengers
    // ------------------------------------------------------------------

    /// Weights are in the unit chosen in the desk preferences.
    pub async fn check_in(
        &mut self,
        passenger_id: &str,
        seat: Option<&str>,
        weights: &[f64],
    ) -> CoreResult<Passenger> {
        let unit = self.mirror.preferences().await?.weight_unit;
        let kilograms: Vec<f64> = weights.iter().map(|w| unit.to_kg(*w)).collect();
        self.roster
            .check_in(&self.session, &mut self.flights, passenger_id, seat, &kilograms)
            .await
    }

    pub async fn un_check_in(&mut self, passenger_id: &str) -> CoreResult<Passenger> {
        self.roster
            .un_check_in(&self.session, &mut self.flights, passenger_id)
            .await
    }

    pub async fn board(&mut self, passenger_id: &str) -> CoreResult<Passenger> {
        self.roster
            .board(&self.session, &mut self.flights, passenger_id)
            .await
    }

    pub async fn unboard(&mut self, passenger_id: &str) -> CoreResult<Passenger> {
        self.roster
            .unboard(&self.session, &mut self.flights, passenger_id)
            .await
    }

    pub async fn board_all_pending(&mut self) -> CoreResult<usize> {
        self.roster
            .board_all_pending(&self.session, &mut self.flights)
            .await
    }

    pub async fn reset_boarding(&mut self) -> CoreResult<usize> {
        self.roster
            .reset_boarding(&self.session, &mut self.flights)
            .await
    }

    pub async fn import_manifest(&mut self, rows: Vec<ManifestRow>) -> CoreResult<ImportSummary> {
        self.roster
            .import_manifest(&self.session, &mut self.flights, rows)
            .await
    }

    pub async fn import_manifest_csv<R: Read>(&mut self, reader: R) -> CoreResult<ImportSummary> {
        let rows = parse_manifest_csv(reader)?;
        self.import_manifest(rows).await
    }

    pub async fn issue_boarding_pass(&mut self, passenger_id: &str) -> CoreResult<BoardingPass> {
        self.roster
            .issue_boarding_pass(&self.session, &mut self.flights, passenger_id)
            .await
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    /// Seat map of the active flight with occupancy; `None` when the flight
    /// has no seat configuration.
    pub fn seat_grid(&self) -> CoreResult<Option<SeatGrid>> {
        self.session.require_active()?;
        Ok(self
            .flights
            .active_seat_map()
            .map(|map| seating::resolve(map, self.roster.passengers())))
    }

    pub fn summary(&self) -> CoreResult<FlightSummary> {
        self.session.require_active()?;
        let flight = self
            .flights
            .active()
            .ok_or_else(|| CoreError::NotFound("Active flight".to_string()))?;
        Ok(FlightSummary::build(
            flight,
            self.flights.active_seat_map(),
            self.roster.passengers(),
        ))
    }

    pub async fn preferences(&self) -> CoreResult<Preferences> {
        Ok(self.mirror.preferences().await?)
    }

    pub async fn set_preferences(&self, prefs: Preferences) -> CoreResult<()> {
        Ok(self.mirror.set_preferences(&prefs).await?)
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    pub async fn sync(&mut self) -> CoreResult<SyncOutcome> {
        self.roster
            .sync_boarding_data(&self.session, &self.flights)
            .await
    }

    /// Records the connectivity state. Coming back online pushes whatever
    /// is pending on any flight, then refreshes the flight list.
    pub async fn set_connectivity(
        &mut self,
        connectivity: Connectivity,
    ) -> CoreResult<Option<SyncOutcome>> {
        if !self.session.set_connectivity(connectivity) {
            return Ok(None);
        }
        info!("Connectivity regained");
        let outcome = self.sync().await?;
        self.flights.refresh_roster(&self.session).await?;
        Ok(Some(outcome))
    }
}
