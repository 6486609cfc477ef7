//! Main application state management

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::{epoch_seconds, IndexPath, TimerConfig, TimerEvent, TimerId, TimerModel, TimerState};
use crate::{
    services::store::{KeyValueStore, StoreError, MODEL_KEY},
    sync::{apply_message, Command, CommandError, PeerOutbox, SyncDelegate, SyncMessage, SyncRole},
};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to lock {0}")]
    LockPoisoned(&'static str),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("no timer is selected")]
    NoSelection,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Process-wide state: the timer model plus everything that observes it
pub struct AppState {
    pub model: Arc<Mutex<TimerModel>>,
    pub role: SyncRole,
    store: Arc<dyn KeyValueStore>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Engine ticks, transitions and sequence hand-overs
    pub event_tx: broadcast::Sender<TimerEvent>,
    /// Outbox for the peer link
    pub outbox: PeerOutbox,
    /// Latest model waiting for the store writer
    persist_tx: watch::Sender<Option<Value>>,
    /// Selected timer snapshot
    pub timer_update_tx: watch::Sender<TimerState>,
    /// Keep the receiver alive to prevent channel closure
    pub _timer_update_rx: watch::Receiver<TimerState>,
    delegate: Option<Arc<SyncDelegate>>,
}

impl AppState {
    /// Create the state, restoring the model from `store` when it holds one
    pub fn new(port: u16, host: String, role: SyncRole, store: Arc<dyn KeyValueStore>) -> Self {
        let model = match store.get(MODEL_KEY) {
            Ok(Some(persisted)) => {
                let model = TimerModel::from_persisted(&persisted);
                info!(
                    "Restored {} groups, {} timers from store",
                    model.count(),
                    model.timer_count()
                );
                model
            }
            Ok(None) => TimerModel::new(),
            Err(e) => {
                warn!("Could not load stored model, starting empty: {}", e);
                TimerModel::new()
            }
        };

        let initial = snapshot(&model, Utc::now());
        let (event_tx, _) = broadcast::channel(256);
        let (timer_update_tx, timer_update_rx) = watch::channel(initial);
        let (persist_tx, _) = watch::channel(None);

        Self {
            model: Arc::new(Mutex::new(model)),
            role,
            store,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            event_tx,
            outbox: PeerOutbox::new(),
            persist_tx,
            timer_update_tx,
            _timer_update_rx: timer_update_rx,
            delegate: None,
        }
    }

    /// Attach the peer link. Without one, nothing is queued for a peer.
    pub fn with_delegate(mut self, delegate: Arc<SyncDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    fn lock_model(&self) -> Result<MutexGuard<'_, TimerModel>, StateError> {
        self.model
            .lock()
            .map_err(|_| StateError::LockPoisoned("timer model"))
    }

    /// Run `updater` against the model, then persist, publish and notify.
    /// `structural` marks changes the peer needs the whole model for.
    fn update_model<T, F>(&self, action: &str, structural: bool, updater: F) -> Result<T, StateError>
    where
        F: FnOnce(&mut TimerModel, DateTime<Utc>) -> Result<T, StateError>,
    {
        let now = Utc::now();
        let mut model = self.lock_model()?;
        let out = updater(&mut *model, now)?;
        let events = model.drain_events();
        let persisted = model.to_persisted();
        let state = snapshot(&model, now);
        drop(model); // Release the lock early

        self.persist(&persisted);
        self.record_action(action, now);
        self.publish(state);
        self.broadcast_events(events);
        if structural && self.role.is_authority() {
            self.queue_peer(SyncMessage::TimerModel { model: persisted });
        }
        Ok(out)
    }

    /// Create a timer at `at`. The first timer created while nothing is
    /// selected becomes the selection.
    pub fn create_timer(&self, at: IndexPath, config: TimerConfig) -> Result<TimerId, StateError> {
        self.update_model("create", true, |model, _| {
            if !model.can_insert_timer(at, None) {
                return Err(StateError::InvalidRequest(format!(
                    "cannot insert a timer at section {} item {}",
                    at.section, at.item
                )));
            }
            let id = model.create_new_timer(at, config);
            if model.selected_timer().is_none() {
                model.set_selected(id, true);
            }
            Ok(id)
        })
    }

    pub fn remove_timer(&self, at: IndexPath) -> Result<TimerId, StateError> {
        self.update_model("remove", true, |model, _| {
            if !model.is_valid(at) {
                return Err(invalid_path(at));
            }
            Ok(model.remove_timer(at).id())
        })
    }

    pub fn move_timer(&self, from: IndexPath, to: IndexPath) -> Result<(), StateError> {
        self.update_model("move", true, |model, _| {
            if !model.is_valid(from) {
                return Err(invalid_path(from));
            }
            if !model.can_insert_timer(to, Some(from)) {
                return Err(StateError::InvalidRequest(format!(
                    "cannot move a timer to section {} item {}",
                    to.section, to.item
                )));
            }
            model.move_timer(from, to);
            Ok(())
        })
    }

    pub fn select_timer(&self, at: IndexPath) -> Result<TimerId, StateError> {
        self.update_model("select", true, |model, _| {
            let id = model
                .timer_at(at)
                .map(|t| t.id())
                .ok_or_else(|| invalid_path(at))?;
            model.set_selected(id, true);
            Ok(id)
        })
    }

    /// Apply a command to the selected timer and forward it to the peer when
    /// it took effect locally. Returns whether it took effect.
    pub fn apply_command(
        &self,
        command: Command,
        value: Option<String>,
    ) -> Result<(bool, TimerState), StateError> {
        info!("Applying command {}", command);
        let applied = self.update_model(command.as_str(), false, |model, now| {
            let timer = model.selected_timer_mut().ok_or(StateError::NoSelection)?;
            Ok(command.apply(timer.engine_mut(), value.as_deref(), now)?)
        })?;

        if applied {
            self.queue_peer(SyncMessage::NewState { command, value });
        } else {
            debug!("Command {} did not apply to the selected timer", command);
        }
        Ok((applied, self.get_timer_state()?))
    }

    /// Apply a message received from the peer and return the reply for it.
    /// Nothing is queued back to the peer from here.
    pub fn handle_peer_message(
        &self,
        message: SyncMessage,
        now: DateTime<Utc>,
    ) -> Result<Option<SyncMessage>, StateError> {
        let action = format!("peer:{}", message.kind());
        let mut model = self.lock_model()?;
        let outcome = apply_message(&mut model, message, now);
        let events = model.drain_events();
        let persist = outcome.model_changed || has_transition(&events);
        let persisted = persist.then(|| model.to_persisted());
        let state = snapshot(&model, now);
        drop(model);

        if let Some(persisted) = persisted {
            self.persist(&persisted);
        }
        self.record_action(&action, now);
        self.publish(state);
        self.broadcast_events(events);
        Ok(outcome.reply)
    }

    /// Advance every running timer to `now`. Mode changes are persisted. A
    /// sequence hand-over moves the selection, which a `sync` cannot express,
    /// so the authority pushes its model for it.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<Vec<TimerEvent>, StateError> {
        let mut model = self.lock_model()?;
        let events = model.advance(now);
        let persisted = has_transition(&events).then(|| model.to_persisted());
        let state = snapshot(&model, now);
        drop(model);

        if let Some(persisted) = persisted {
            self.persist(&persisted);
            let handed_over = events
                .iter()
                .any(|e| matches!(e, TimerEvent::SequenceAdvanced { .. }));
            if handed_over && self.role.is_authority() {
                self.queue_peer(SyncMessage::TimerModel { model: persisted });
            }
        }
        self.publish(state);
        self.broadcast_events(events.clone());
        Ok(events)
    }

    /// The `sync` message for the selected timer, if it is running
    pub fn sync_message(&self, now: DateTime<Utc>) -> Result<Option<SyncMessage>, StateError> {
        let model = self.lock_model()?;
        Ok(model
            .selected_timer()
            .filter(|t| t.engine().is_running())
            .map(|t| {
                let (to, date) = t.engine().sync_point(now);
                SyncMessage::Sync {
                    to: i64::from(to),
                    date: epoch_seconds(date),
                }
            }))
    }

    /// Current selected timer state
    pub fn get_timer_state(&self) -> Result<TimerState, StateError> {
        let model = self.lock_model()?;
        Ok(snapshot(&model, Utc::now()))
    }

    pub fn model_snapshot(&self) -> Result<Value, StateError> {
        Ok(self.lock_model()?.to_persisted())
    }

    /// `(groups, timers)`
    pub fn model_counts(&self) -> Result<(usize, usize), StateError> {
        let model = self.lock_model()?;
        Ok((model.count(), model.timer_count()))
    }

    /// Write the model to the store
    pub fn save(&self) -> Result<(), StateError> {
        let persisted = self.model_snapshot()?;
        self.store.set(MODEL_KEY, persisted)?;
        Ok(())
    }

    /// Queue a message for the peer link, if there is one
    pub fn queue_peer(&self, message: SyncMessage) {
        if self.delegate.is_none() {
            return;
        }
        self.outbox.push(message);
    }

    /// `None` when no peer is configured
    pub fn peer_reachable(&self) -> Option<bool> {
        self.delegate.as_ref().map(|d| d.is_reachable())
    }

    /// Hand the model to the store writer, or write it here when no writer
    /// is running.
    fn persist(&self, persisted: &Value) {
        if self.persist_tx.receiver_count() > 0 {
            self.persist_tx.send_replace(Some(persisted.clone()));
        } else if let Err(e) = self.store.set(MODEL_KEY, persisted.clone()) {
            warn!("Failed to persist timer model: {}", e);
        }
    }

    /// Models queued for writing; only the newest unwritten one is kept
    pub fn subscribe_persisted(&self) -> watch::Receiver<Option<Value>> {
        self.persist_tx.subscribe()
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    fn record_action(&self, action: &str, now: DateTime<Utc>) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(now);
        }
    }

    fn publish(&self, state: TimerState) {
        if let Err(e) = self.timer_update_tx.send(state) {
            warn!("Failed to send timer update: {}", e);
        }
    }

    fn broadcast_events(&self, events: Vec<TimerEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.event_tx.send(event);
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}

fn snapshot(model: &TimerModel, now: DateTime<Utc>) -> TimerState {
    model
        .selected_timer()
        .map(|t| TimerState::from_timer(t, now))
        .unwrap_or_default()
}

fn has_transition(events: &[TimerEvent]) -> bool {
    events
        .iter()
        .any(|e| !matches!(e, TimerEvent::Tick { .. }))
}

fn invalid_path(at: IndexPath) -> StateError {
    StateError::InvalidRequest(format!("no timer at section {} item {}", at.section, at.item))
}
