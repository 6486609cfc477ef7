//! Pending messages for the peer link
//!
//! Commands are kept in order and never dropped. A newer `sync` replaces any
//! pending one, and a newer `timerModel` replaces both pending models and
//! pending syncs, since those described the model it supersedes.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::Notify;
use tracing::debug;

use super::messages::SyncMessage;

#[derive(Debug, Default)]
pub struct PeerOutbox {
    pending: Mutex<VecDeque<SyncMessage>>,
    ready: Notify,
}

impl PeerOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<SyncMessage>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, message: SyncMessage) {
        let mut pending = self.pending();
        let before = pending.len();
        match &message {
            SyncMessage::Sync { .. } => pending.retain(|m| !matches!(m, SyncMessage::Sync { .. })),
            SyncMessage::TimerModel { .. } => pending.retain(|m| {
                !matches!(m, SyncMessage::Sync { .. } | SyncMessage::TimerModel { .. })
            }),
            SyncMessage::RequestContext | SyncMessage::NewState { .. } => {}
        }
        if pending.len() != before {
            debug!("{} superseded {} pending message(s)", message.kind(), before - pending.len());
        }
        pending.push_back(message);
        drop(pending);
        self.ready.notify_one();
    }

    pub fn try_pop(&self) -> Option<SyncMessage> {
        self.pending().pop_front()
    }

    /// Wait for the next pending message
    pub async fn pop(&self) -> SyncMessage {
        loop {
            if let Some(message) = self.try_pop() {
                return message;
            }
            self.ready.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }
}
