use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dcs_shared::{Flight, Passenger};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// The two collections of the remote document store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Flights,
    Passengers,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Flights => "flights",
            Collection::Passengers => "passengers",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
    #[error("Remote store backend error: {0}")]
    Backend(String),
    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One write inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Full overwrite (creates when absent)
    Put {
        collection: Collection,
        id: String,
        doc: Value,
    },
    /// Shallow merge of top-level fields (creates when absent)
    Merge {
        collection: Collection,
        id: String,
        patch: Value,
    },
    Delete {
        collection: Collection,
        id: String,
    },
}

/// Multi-document write, applied all-or-nothing where the backend allows it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, collection: Collection, id: &str, doc: Value) -> &mut Self {
        self.ops.push(WriteOp::Put {
            collection,
            id: id.to_string(),
            doc,
        });
        self
    }

    pub fn merge(&mut self, collection: Collection, id: &str, patch: Value) -> &mut Self {
        self.ops.push(WriteOp::Merge {
            collection,
            id: id.to_string(),
            patch,
        });
        self
    }

    pub fn delete(&mut self, collection: Collection, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection,
            id: id.to_string(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Port to the remote document database. Documents are JSON objects keyed
/// by a string id inside a [`Collection`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Cheap round-trip used as the connectivity probe
    async fn ping(&self) -> StoreResult<()>;

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>>;

    async fn put(&self, collection: Collection, id: &str, doc: Value) -> StoreResult<()>;

    async fn merge(&self, collection: Collection, id: &str, patch: Value) -> StoreResult<()>;

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()>;

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Value>>;

    /// Documents whose top-level `field` equals `value`
    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>>;

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// Per-passenger boarding change pushed during reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct BoardedFlag {
    pub passenger_id: String,
    pub boarded: bool,
    pub boarded_time: Option<DateTime<Utc>>,
}

/// Typed access to the `flights` and `passengers` collections
#[derive(Clone)]
pub struct RemoteRepository {
    store: Arc<dyn DocumentStore>,
}

impl RemoteRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn ping(&self) -> StoreResult<()> {
        self.store.ping().await
    }

    // ------------------------------------------------------------------
    // Flights
    // ------------------------------------------------------------------

    pub async fn save_flight(&self, flight: &Flight) -> StoreResult<()> {
        let doc = serde_json::to_value(flight)?;
        self.store.put(Collection::Flights, &flight.id, doc).await?;
        debug!("Flight document written: {}", flight.id);
        Ok(())
    }

    pub async fn get_flight(&self, id: &str) -> StoreResult<Option<Flight>> {
        match self.store.get(Collection::Flights, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Most recently updated first
    pub async fn list_flights(&self) -> StoreResult<Vec<Flight>> {
        let docs = self.store.list(Collection::Flights).await?;
        let mut flights: Vec<Flight> = decode_all(Collection::Flights, docs);
        flights.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(flights)
    }

    /// Flight-level boarding fields only; the rest of the document is left alone.
    pub async fn update_flight_boarding(&self, flight: &Flight) -> StoreResult<()> {
        self.store
            .merge(Collection::Flights, &flight.id, boarding_patch(flight)?)
            .await
    }

    /// Deletes the flight and every passenger referencing it in one batch.
    /// Returns the number of passenger documents removed.
    pub async fn delete_flight_cascade(&self, flight_id: &str) -> StoreResult<usize> {
        let passengers = self
            .store
            .query_eq(Collection::Passengers, "flightId", &json!(flight_id))
            .await?;

        let mut batch = WriteBatch::new();
        let mut removed = 0;
        for doc in &passengers {
            if let Some(id) = doc.get("id").and_then(Value::as_str) {
                batch.delete(Collection::Passengers, id);
                removed += 1;
            }
        }
        batch.delete(Collection::Flights, flight_id);

        self.store.commit(batch).await?;
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Passengers
    // ------------------------------------------------------------------

    pub async fn upsert_passenger(&self, passenger: &Passenger) -> StoreResult<()> {
        let doc = serde_json::to_value(passenger)?;
        self.store
            .put(Collection::Passengers, &passenger.id, doc)
            .await
    }

    pub async fn upsert_passengers(&self, passengers: &[Passenger]) -> StoreResult<()> {
        if passengers.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        for passenger in passengers {
            batch.put(
                Collection::Passengers,
                &passenger.id,
                serde_json::to_value(passenger)?,
            );
        }
        self.store.commit(batch).await
    }

    pub async fn passengers_for_flight(&self, flight_id: &str) -> StoreResult<Vec<Passenger>> {
        let docs = self
            .store
            .query_eq(Collection::Passengers, "flightId", &json!(flight_id))
            .await?;
        Ok(decode_all(Collection::Passengers, docs))
    }

    /// One batch: full documents for `upserts`, boarded flags for `flags`,
    /// and the local flight document merged over the remote one.
    pub async fn push_boarding(
        &self,
        flight: &Flight,
        upserts: &[Passenger],
        flags: &[BoardedFlag],
    ) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        for passenger in upserts {
            batch.put(
                Collection::Passengers,
                &passenger.id,
                serde_json::to_value(passenger)?,
            );
        }
        for flag in flags {
            batch.merge(
                Collection::Passengers,
                &flag.passenger_id,
                json!({
                    "boarded": flag.boarded,
                    "boardedTime": flag.boarded_time,
                }),
            );
        }
        batch.merge(Collection::Flights, &flight.id, serde_json::to_value(flight)?);
        self.store.commit(batch).await
    }
}

fn boarding_patch(flight: &Flight) -> StoreResult<Value> {
    Ok(json!({
        "boarding": serde_json::to_value(flight.boarding)?,
        "boardedPassengerIds": serde_json::to_value(&flight.boarded_passenger_ids)?,
        "lastBoardingUpdate": flight.last_boarding_update,
        "updatedAt": flight.updated_at,
    }))
}

fn decode_all<T: DeserializeOwned>(collection: Collection, docs: Vec<Value>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<T>(doc) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping malformed {} document: {}", collection, e);
                None
            }
        })
        .collect()
}
