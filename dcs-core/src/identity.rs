use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

/// Source of document identifiers, injected into the managers.
pub trait IdGenerator: Send + Sync {
    fn flight_id(&self) -> String;
    fn passenger_id(&self) -> String;
}

/// `FL-<unix millis>` flight ids and random passenger ids.
///
/// Two flights created within the same millisecond on this process still get
/// distinct ids; ids from different devices are not coordinated.
#[derive(Debug, Default)]
pub struct TimestampIdGenerator {
    last_millis: AtomicI64,
}

impl TimestampIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_millis.load(Ordering::SeqCst);
        loop {
            let candidate = if now > last { now } else { last + 1 };
            match self.last_millis.compare_exchange(
                last,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

impl IdGenerator for TimestampIdGenerator {
    fn flight_id(&self) -> String {
        format!("FL-{}", self.next_millis())
    }

    fn passenger_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic ids (`FL-1`, `PX-1`, ...) for tests and fixtures.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    flights: AtomicU64,
    passengers: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn flight_id(&self) -> String {
        format!("FL-{}", self.flights.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn passenger_id(&self) -> String {
        format!("PX-{}", self.passengers.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
