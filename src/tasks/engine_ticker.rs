//! Engine ticker background task

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::state::{AppState, TimerEvent, TimerMode};

/// Background task that advances every running timer. Engines only act on
/// whole seconds, so `period` below a second just tightens the sampling.
pub async fn engine_ticker_task(state: Arc<AppState>, period: Duration) {
    info!("Starting engine ticker task ({:?} period)", period);

    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let events = match state.tick(Utc::now()) {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to advance timers: {}", e);
                continue;
            }
        };

        for event in &events {
            match event {
                TimerEvent::Transition { timer, to: TimerMode::Alarm, .. } => {
                    info!("Timer {} reached its alarm", timer);
                }
                TimerEvent::SequenceAdvanced { group, to, transition_sound, .. } => {
                    info!(
                        "Group {} moved on to timer {} (transition sound: {})",
                        group,
                        to,
                        transition_sound.as_deref().unwrap_or("none")
                    );
                }
                TimerEvent::Transition { timer, from, to } => {
                    debug!("Timer {} {} -> {}", timer, from, to);
                }
                TimerEvent::Tick { .. } => {}
            }
        }
    }
}
