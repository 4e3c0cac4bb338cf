//! Reconciliation of offline boarding changes with the remote store.

use std::collections::BTreeSet;

use chrono::Utc;
use dcs_core::{BoardedFlag, BoardingSnapshot, CoreResult, Session};
use dcs_shared::Passenger;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::flights::FlightManager;
use crate::roster::PassengerRoster;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    NothingPending,
    Synced { passengers: usize },
    /// Local state and the pending marker are left as they were.
    Failed { reason: String },
}

impl PassengerRoster {
    /// Pushes everything this device still owes the remote store.
    ///
    /// Flights deleted locally are deleted remotely first. Then every flight
    /// whose pending marker is set gets one batch: full documents, boarded
    /// flags and the flight itself. The first failure stops the run; flights
    /// already pushed stay settled, the failing one keeps its local state and
    /// marker.
    pub async fn sync_boarding_data(
        &mut self,
        session: &Session,
        flights: &FlightManager,
    ) -> CoreResult<SyncOutcome> {
        let mut deletes = self.mirror.pending_deletes().await?;

        let ids: BTreeSet<&str> = flights
            .flights()
            .iter()
            .chain(flights.active())
            .map(|f| f.id.as_str())
            .collect();
        let mut pending = Vec::new();
        for id in ids {
            let snapshot = self.mirror.boarding(id).await?;
            if snapshot.is_pending() {
                if let Some(flight) = flights.flight(id) {
                    pending.push((flight, snapshot));
                }
            }
        }

        if deletes.is_empty() && pending.is_empty() {
            debug!("Nothing to synchronise");
            return Ok(SyncOutcome::NothingPending);
        }
        if !session.is_online() {
            return Ok(SyncOutcome::Failed {
                reason: "offline".to_string(),
            });
        }

        for id in deletes.clone() {
            match self.remote.delete_flight_cascade(&id).await {
                Ok(removed) => {
                    info!("Deferred delete of flight {} done, {} passenger(s)", id, removed);
                    deletes.remove(&id);
                    self.mirror.set_pending_deletes(&deletes).await?;
                }
                Err(e) => {
                    error!("Deferred delete of flight {} failed: {}", id, e);
                    return Ok(SyncOutcome::Failed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut pushed = 0;
        for (flight, mut snapshot) in pending {
            let (upserts, flags) = self.pending_writes(&flight.id, &snapshot).await?;

            if let Err(e) = self.remote.push_boarding(flight, &upserts, &flags).await {
                error!("Synchronisation of flight {} failed: {}", flight.id, e);
                return Ok(SyncOutcome::Failed {
                    reason: e.to_string(),
                });
            }

            snapshot.clear_pending();
            snapshot.updated_at = Some(Utc::now());
            self.mirror.set_boarding(&snapshot).await?;

            let count = upserts.len() + flags.len();
            info!("Synchronised flight {}: {} passenger(s)", flight.id, count);
            pushed += count;
        }

        Ok(SyncOutcome::Synced { passengers: pushed })
    }

    /// What the marker of `flight_id` lists, read from the loaded roster or,
    /// for any other flight, from its local snapshot.
    async fn pending_writes(
        &self,
        flight_id: &str,
        snapshot: &BoardingSnapshot,
    ) -> CoreResult<(Vec<Passenger>, Vec<BoardedFlag>)> {
        let stored;
        let passengers: &[Passenger] = if self.flight_id.as_deref() == Some(flight_id) {
            &self.passengers
        } else {
            stored = match self.mirror.passengers(flight_id).await? {
                Some(list) => list,
                None => self
                    .mirror
                    .checked_in()
                    .await?
                    .into_iter()
                    .filter(|p| p.flight_id == flight_id)
                    .collect(),
            };
            &stored
        };

        let mut upserts = Vec::new();
        let mut flags = Vec::new();
        for passenger in passengers {
            if snapshot.pending_upserts.contains(&passenger.id) {
                upserts.push(passenger.clone());
            } else if snapshot.pending_flags.contains(&passenger.id) {
                flags.push(BoardedFlag {
                    passenger_id: passenger.id.clone(),
                    boarded: passenger.boarded,
                    boarded_time: passenger.boarded_time,
                });
            }
        }
        Ok((upserts, flags))
    }
}
