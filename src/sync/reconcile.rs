//! Applying inbound peer messages to the local model

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::messages::SyncMessage;
use crate::state::{from_epoch_seconds, TimerModel};

/// Outcome of handling one inbound message
#[derive(Debug, Default, PartialEq)]
pub struct Reconciled {
    /// What to answer the sender with, if anything
    pub reply: Option<SyncMessage>,
    /// The model was replaced wholesale and should be persisted
    pub model_changed: bool,
}

/// Apply `message` to `model` as of `now`. Messages that address the
/// selected timer are dropped when nothing is selected.
pub fn apply_message(model: &mut TimerModel, message: SyncMessage, now: DateTime<Utc>) -> Reconciled {
    match message {
        SyncMessage::RequestContext => {
            debug!("Peer requested context");
            Reconciled {
                reply: Some(SyncMessage::TimerModel {
                    model: model.to_persisted(),
                }),
                model_changed: false,
            }
        }
        SyncMessage::TimerModel { model: persisted } => {
            *model = TimerModel::from_persisted(&persisted);
            info!(
                "Replaced model from peer: {} groups, {} timers",
                model.count(),
                model.timer_count()
            );
            Reconciled {
                reply: None,
                model_changed: true,
            }
        }
        SyncMessage::Sync { to, date } => {
            let Some(timer) = model.selected_timer_mut() else {
                debug!("Ignoring sync, no timer selected");
                return Reconciled::default();
            };
            let date = from_epoch_seconds(date).unwrap_or_else(|| {
                warn!("Sync carried an invalid date {}, using now", date);
                now
            });
            timer.engine_mut().sync(to, date, now);
            Reconciled::default()
        }
        SyncMessage::NewState { command, value } => {
            let Some(timer) = model.selected_timer_mut() else {
                warn!("Ignoring {} from peer, no timer selected", command);
                return Reconciled::default();
            };
            match command.apply(timer.engine_mut(), value.as_deref(), now) {
                Ok(true) => debug!("Applied {} from peer", command),
                Ok(false) => debug!("{} from peer did not apply in mode {}", command, timer.mode()),
                Err(e) => warn!("Rejected {} from peer: {}", command, e),
            }
            Reconciled::default()
        }
    }
}
