use dcs_checkin::SyncOutcome;
use dcs_core::Connectivity;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::state::AppState;

/// Probes the remote store forever and feeds the result to the desk.
pub async fn start_connectivity_worker(state: AppState, period: Duration) {
    info!("Connectivity worker started, probing every {:?}", period);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        probe_once(&state).await;
    }
}

/// One probe. Returns the sync outcome when the probe found the store
/// reachable again after an outage.
pub async fn probe_once(state: &AppState) -> Option<SyncOutcome> {
    let connectivity = match state.remote.ping().await {
        Ok(()) => Connectivity::Online,
        Err(e) => {
            debug!("Remote store probe failed: {}", e);
            Connectivity::Offline
        }
    };

    let mut desk = state.desk.lock().await;
    let previous = desk.session().connectivity();
    if previous != connectivity {
        match connectivity {
            Connectivity::Online => info!("Remote store reachable again"),
            Connectivity::Offline => warn!("Remote store unreachable, working offline"),
        }
    }

    match desk.set_connectivity(connectivity).await {
        Ok(Some(outcome)) => {
            info!("Reconnect sync: {:?}", outcome);
            Some(outcome)
        }
        Ok(None) => None,
        Err(e) => {
            error!("Reconnect handling failed: {}", e);
            None
        }
    }
}
