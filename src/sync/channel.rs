//! Peer transport abstraction and the in-process transport

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::messages::SyncMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivationState {
    NotActivated,
    Inactive,
    Activated,
}

/// Whether retrying a failed send may succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transience {
    Retryable,
    Permanent,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The peer could not be reached right now
    #[error("peer unavailable: {0}")]
    Unavailable(String),

    #[error("peer session is not activated")]
    NotActivated,

    #[error("peer dropped the request without replying")]
    Disconnected,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed peer message: {0}")]
    Codec(String),
}

impl ChannelError {
    pub fn transience(&self) -> Transience {
        match self {
            ChannelError::Unavailable(_) => Transience::Retryable,
            ChannelError::NotActivated
            | ChannelError::Disconnected
            | ChannelError::Transport(_)
            | ChannelError::Codec(_) => Transience::Permanent,
        }
    }
}

/// A reliable point-to-point link to the other device
#[async_trait]
pub trait PeerChannel: Send + Sync {
    fn activation_state(&self) -> ActivationState;

    /// Deliver a message and wait for the peer's reply (which may be empty)
    async fn send_message(&self, message: &SyncMessage) -> Result<Option<SyncMessage>, ChannelError>;

    /// Push state the peer should treat as its latest context
    async fn update_application_context(&self, message: &SyncMessage) -> Result<(), ChannelError> {
        self.send_message(message).await.map(|_| ())
    }
}

/// A message handed to the local side by a transport
#[derive(Debug)]
pub struct Inbound {
    pub message: SyncMessage,
    reply: Option<oneshot::Sender<Option<SyncMessage>>>,
}

impl Inbound {
    pub fn new(message: SyncMessage) -> (Self, oneshot::Receiver<Option<SyncMessage>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                message,
                reply: Some(tx),
            },
            rx,
        )
    }

    pub fn respond(mut self, reply: Option<SyncMessage>) {
        if let Some(tx) = self.reply.take() {
            if tx.send(reply).is_err() {
                debug!("Peer stopped waiting for a reply");
            }
        }
    }
}

/// In-process transport: each end delivers into the other end's receiver.
#[derive(Debug)]
pub struct MemoryChannel {
    peer: mpsc::Sender<Inbound>,
    activated: AtomicBool,
    failures: Mutex<VecDeque<ChannelError>>,
    attempts: AtomicUsize,
}

pub type MemoryEnd = (MemoryChannel, mpsc::Receiver<Inbound>);

impl MemoryChannel {
    /// Two connected ends, each with the receiver for messages sent to it
    pub fn pair(buffer: usize) -> (MemoryEnd, MemoryEnd) {
        let (a_tx, a_rx) = mpsc::channel(buffer);
        let (b_tx, b_rx) = mpsc::channel(buffer);
        ((Self::new(b_tx), a_rx), (Self::new(a_tx), b_rx))
    }

    fn new(peer: mpsc::Sender<Inbound>) -> Self {
        Self {
            peer,
            activated: AtomicBool::new(true),
            failures: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn set_activated(&self, activated: bool) {
        self.activated.store(activated, Ordering::SeqCst);
    }

    /// Make the next send fail with `error`; queued in order
    pub fn inject_failure(&self, error: ChannelError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(error);
        }
    }

    /// Number of sends attempted so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerChannel for MemoryChannel {
    fn activation_state(&self) -> ActivationState {
        if self.activated.load(Ordering::SeqCst) {
            ActivationState::Activated
        } else {
            ActivationState::NotActivated
        }
    }

    async fn send_message(&self, message: &SyncMessage) -> Result<Option<SyncMessage>, ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let injected = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        if let Some(error) = injected {
            return Err(error);
        }
        if self.activation_state() != ActivationState::Activated {
            return Err(ChannelError::NotActivated);
        }

        let (inbound, reply) = Inbound::new(message.clone());
        self.peer
            .send(inbound)
            .await
            .map_err(|_| ChannelError::Unavailable("peer receiver closed".to_string()))?;
        reply.await.map_err(|_| ChannelError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_and_replies() {
        let ((a, _a_rx), (_b, mut b_rx)) = MemoryChannel::pair(4);

        let responder = tokio::spawn(async move {
            let inbound = b_rx.recv().await.unwrap();
            assert_eq!(inbound.message, SyncMessage::RequestContext);
            inbound.respond(Some(SyncMessage::Sync { to: 3, date: 0.0 }));
        });

        let reply = a.send_message(&SyncMessage::RequestContext).await.unwrap();
        assert_eq!(reply, Some(SyncMessage::Sync { to: 3, date: 0.0 }));
        responder.await.unwrap();
        assert_eq!(a.attempts(), 1);
    }

    #[tokio::test]
    async fn test_closed_peer_is_retryable() {
        let ((a, _a_rx), (_b, b_rx)) = MemoryChannel::pair(1);
        drop(b_rx);
        let err = a.send_message(&SyncMessage::RequestContext).await.unwrap_err();
        assert_eq!(err.transience(), Transience::Retryable);
    }

    #[tokio::test]
    async fn test_deactivated_and_injected_failures() {
        let ((a, _a_rx), _b) = MemoryChannel::pair(1);
        a.inject_failure(ChannelError::Transport("boom".into()));
        assert_eq!(
            a.send_message(&SyncMessage::RequestContext).await,
            Err(ChannelError::Transport("boom".into()))
        );

        a.set_activated(false);
        assert_eq!(a.activation_state(), ActivationState::NotActivated);
        assert_eq!(
            a.update_application_context(&SyncMessage::RequestContext).await,
            Err(ChannelError::NotActivated)
        );
        assert_eq!(ChannelError::NotActivated.transience(), Transience::Permanent);
    }
}
