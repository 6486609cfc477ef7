//! Store writer background task

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{services::store::MODEL_KEY, state::AppState};

/// Write queued models to the store off the async workers. Models queued
/// while a write is in flight collapse into the newest one.
pub async fn store_writer_task(state: Arc<AppState>) {
    info!("Starting store writer task");

    let mut queued = state.subscribe_persisted();
    let store = state.store();

    while queued.changed().await.is_ok() {
        let Some(model) = queued.borrow_and_update().clone() else {
            continue;
        };
        let store = Arc::clone(&store);
        match tokio::task::spawn_blocking(move || store.set(MODEL_KEY, model)).await {
            Ok(Ok(())) => debug!("Timer model written to store"),
            Ok(Err(e)) => warn!("Failed to persist timer model: {}", e),
            Err(e) => error!("Store write did not complete: {}", e),
        }
    }

    info!("Persist channel closed, stopping store writer task");
}
