use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dcs_shared::{Flight, Passenger};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
    #[error("Cache entry {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Port to the device-local key-value store used as offline cache.
#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> CacheResult<()>;
    async fn remove(&self, key: &str) -> CacheResult<()>;
}

pub const ACTIVE_FLIGHT_ID_KEY: &str = "active_flight_id";
pub const FLIGHTS_KEY: &str = "flights";
pub const ACTIVE_FLIGHT_KEY: &str = "active_flight";
pub const CHECKED_IN_KEY: &str = "checked_in_passengers";
pub const AUTO_PRINT_KEY: &str = "pref:auto_print";
pub const WEIGHT_UNIT_KEY: &str = "pref:weight_unit";
pub const BAG_TAG_COUNTER_KEY: &str = "bag_tag_counter";
pub const PENDING_DELETES_KEY: &str = "pending_flight_deletes";

fn boarding_key(flight_id: &str) -> String {
    format!("boarding:{}", flight_id)
}

fn passengers_key(flight_id: &str) -> String {
    format!("passengers:{}", flight_id)
}

/// Boarding state of one flight as last seen on this device, plus what still
/// has to reach the remote store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoardingSnapshot {
    pub flight_id: String,
    #[serde(default)]
    pub boarded_ids: BTreeSet<String>,
    /// Passengers whose boarded flag has not been written remotely
    #[serde(default)]
    pub pending_flags: BTreeSet<String>,
    /// Passengers whose full document has not been written remotely
    #[serde(default)]
    pub pending_upserts: BTreeSet<String>,
    /// Flight-level boarding fields not yet written remotely
    #[serde(default)]
    pub flight_pending: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BoardingSnapshot {
    pub fn new(flight_id: &str) -> Self {
        Self {
            flight_id: flight_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.flight_pending || !self.pending_flags.is_empty() || !self.pending_upserts.is_empty()
    }

    pub fn clear_pending(&mut self) {
        self.pending_flags.clear();
        self.pending_upserts.clear();
        self.flight_pending = false;
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Kg,
    Lb,
}

impl WeightUnit {
    const LB_PER_KG: f64 = 2.204_622_621_8;

    pub fn to_kg(&self, value: f64) -> f64 {
        match self {
            WeightUnit::Kg => value,
            WeightUnit::Lb => value / Self::LB_PER_KG,
        }
    }

    pub fn from_kg(&self, kg: f64) -> f64 {
        match self {
            WeightUnit::Kg => kg,
            WeightUnit::Lb => kg * Self::LB_PER_KG,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub auto_print: bool,
    pub weight_unit: WeightUnit,
}

/// Typed view over a [`LocalCache`]: every value is a JSON snapshot under a
/// fixed key.
#[derive(Clone)]
pub struct LocalMirror {
    cache: Arc<dyn LocalCache>,
}

impl LocalMirror {
    pub fn new(cache: Arc<dyn LocalCache>) -> Self {
        Self { cache }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.cache.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| CacheError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.cache.set(key, &raw).await
    }

    // Active flight

    pub async fn active_flight_id(&self) -> CacheResult<Option<String>> {
        self.read(ACTIVE_FLIGHT_ID_KEY).await
    }

    pub async fn set_active_flight_id(&self, id: Option<&str>) -> CacheResult<()> {
        match id {
            Some(id) => self.write(ACTIVE_FLIGHT_ID_KEY, id).await,
            None => self.cache.remove(ACTIVE_FLIGHT_ID_KEY).await,
        }
    }

    pub async fn active_flight(&self) -> CacheResult<Option<Flight>> {
        self.read(ACTIVE_FLIGHT_KEY).await
    }

    pub async fn set_active_flight(&self, flight: Option<&Flight>) -> CacheResult<()> {
        match flight {
            Some(flight) => self.write(ACTIVE_FLIGHT_KEY, flight).await,
            None => self.cache.remove(ACTIVE_FLIGHT_KEY).await,
        }
    }

    // Flight roster

    pub async fn flights(&self) -> CacheResult<Vec<Flight>> {
        Ok(self.read(FLIGHTS_KEY).await?.unwrap_or_default())
    }

    pub async fn set_flights(&self, flights: &[Flight]) -> CacheResult<()> {
        self.write(FLIGHTS_KEY, flights).await
    }

    // Passengers

    pub async fn checked_in(&self) -> CacheResult<Vec<Passenger>> {
        Ok(self.read(CHECKED_IN_KEY).await?.unwrap_or_default())
    }

    pub async fn set_checked_in(&self, passengers: &[Passenger]) -> CacheResult<()> {
        self.write(CHECKED_IN_KEY, passengers).await
    }

    pub async fn passengers(&self, flight_id: &str) -> CacheResult<Option<Vec<Passenger>>> {
        self.read(&passengers_key(flight_id)).await
    }

    pub async fn set_passengers(&self, flight_id: &str, passengers: &[Passenger]) -> CacheResult<()> {
        self.write(&passengers_key(flight_id), passengers).await
    }

    pub async fn remove_passengers(&self, flight_id: &str) -> CacheResult<()> {
        self.cache.remove(&passengers_key(flight_id)).await
    }

    // Boarding

    pub async fn boarding(&self, flight_id: &str) -> CacheResult<BoardingSnapshot> {
        Ok(self
            .read(&boarding_key(flight_id))
            .await?
            .unwrap_or_else(|| BoardingSnapshot::new(flight_id)))
    }

    pub async fn set_boarding(&self, snapshot: &BoardingSnapshot) -> CacheResult<()> {
        self.write(&boarding_key(&snapshot.flight_id), snapshot).await
    }

    pub async fn remove_boarding(&self, flight_id: &str) -> CacheResult<()> {
        self.cache.remove(&boarding_key(flight_id)).await
    }

    /// Flights deleted on this device whose remote delete has not gone through
    pub async fn pending_deletes(&self) -> CacheResult<BTreeSet<String>> {
        Ok(self.read(PENDING_DELETES_KEY).await?.unwrap_or_default())
    }

    pub async fn set_pending_deletes(&self, ids: &BTreeSet<String>) -> CacheResult<()> {
        self.write(PENDING_DELETES_KEY, ids).await
    }

    // Preferences

    pub async fn preferences(&self) -> CacheResult<Preferences> {
        Ok(Preferences {
            auto_print: self.read(AUTO_PRINT_KEY).await?.unwrap_or(false),
            weight_unit: self.read(WEIGHT_UNIT_KEY).await?.unwrap_or_default(),
        })
    }

    pub async fn set_preferences(&self, prefs: &Preferences) -> CacheResult<()> {
        self.write(AUTO_PRINT_KEY, &prefs.auto_print).await?;
        self.write(WEIGHT_UNIT_KEY, &prefs.weight_unit).await
    }

    /// Bumps and returns the device-wide bag tag counter (first value is 1).
    pub async fn next_bag_tag_number(&self) -> CacheResult<u64> {
        let current: u64 = self.read(BAG_TAG_COUNTER_KEY).await?.unwrap_or(0);
        let next = current + 1;
        self.write(BAG_TAG_COUNTER_KEY, &next).await?;
        Ok(next)
    }
}
