//! Periodic sync push from the authority

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Queue a `sync` for the selected running timer every `period`. Replicas
/// never push, so the task returns straight away for them.
pub async fn sync_push_task(state: Arc<AppState>, period: Duration) {
    if !state.role.is_authority() {
        debug!("Replica role, not pushing sync");
        return;
    }
    info!("Starting sync push task every {:?}", period);

    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match state.sync_message(Utc::now()) {
            Ok(Some(message)) => state.queue_peer(message),
            Ok(None) => {}
            Err(e) => warn!("Failed to build sync message: {}", e),
        }
    }
}
