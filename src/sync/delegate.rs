//! Sending to the peer with bounded retries, reply timeouts and a tracked
//! reachability flag

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::{sync::broadcast, time::sleep};
use tracing::{debug, error, info, warn};

use super::{
    channel::{ActivationState, ChannelError, PeerChannel, Transience},
    messages::SyncMessage,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Retries after the first attempt, for retryable failures only
    pub max_retries: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on waiting for any single reply
    pub reply_timeout: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            min_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_millis(1000),
            reply_timeout: Duration::from_secs(10),
        }
    }
}

/// Link notifications for the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LinkEvent {
    Reachable,
    Unreachable { reason: String },
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("peer unreachable after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: ChannelError },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("no reply from peer within {0:?}")]
    Timeout(Duration),

    #[error("peer sent no reply")]
    NoReply,
}

pub struct SyncDelegate {
    channel: Arc<dyn PeerChannel>,
    policy: SyncPolicy,
    reachable: AtomicBool,
    link_tx: broadcast::Sender<LinkEvent>,
}

impl SyncDelegate {
    pub fn new(channel: Arc<dyn PeerChannel>, policy: SyncPolicy) -> Self {
        let (link_tx, _) = broadcast::channel(32);
        Self {
            channel,
            policy,
            reachable: AtomicBool::new(true),
            link_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.link_tx.subscribe()
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    pub fn activation_state(&self) -> ActivationState {
        self.channel.activation_state()
    }

    /// Send and return whatever the peer replied
    pub async fn send(&self, message: &SyncMessage) -> Result<Option<SyncMessage>, SyncError> {
        debug!("Sending {} to peer", message.kind());
        self.with_retry(message.kind(), self.policy.max_retries, || {
            self.channel.send_message(message)
        })
        .await
    }

    /// One attempt, no retries. Used to test a link already marked
    /// unreachable; success marks it reachable again.
    pub async fn send_once(&self, message: &SyncMessage) -> Result<Option<SyncMessage>, SyncError> {
        debug!("Trying {} once on a down link", message.kind());
        self.with_retry(message.kind(), 0, || self.channel.send_message(message))
            .await
    }

    /// Send and require a reply, e.g. for `requestContext`
    pub async fn request(&self, message: &SyncMessage) -> Result<SyncMessage, SyncError> {
        match self.send(message).await? {
            Some(reply) => Ok(reply),
            None => {
                self.notify(LinkEvent::Error {
                    message: format!("peer sent no reply to {}", message.kind()),
                });
                Err(SyncError::NoReply)
            }
        }
    }

    /// Push the latest context (the full model) to the peer
    pub async fn push_context(&self, message: &SyncMessage) -> Result<(), SyncError> {
        debug!("Pushing {} context to peer", message.kind());
        self.with_retry(message.kind(), self.policy.max_retries, || {
            self.channel.update_application_context(message)
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, kind: &str, max_retries: u32, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChannelError>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = match tokio::time::timeout(self.policy.reply_timeout, op()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("Peer did not answer {} within {:?}", kind, self.policy.reply_timeout);
                    self.notify(LinkEvent::Error {
                        message: format!("timed out waiting for peer reply to {kind}"),
                    });
                    return Err(SyncError::Timeout(self.policy.reply_timeout));
                }
            };

            match outcome {
                Ok(value) => {
                    self.mark_reachable();
                    return Ok(value);
                }
                Err(e) if e.transience() == Transience::Retryable => {
                    if attempts > max_retries {
                        warn!("Giving up on {} after {} attempts: {}", kind, attempts, e);
                        self.mark_unreachable(e.to_string());
                        return Err(SyncError::RetriesExhausted { attempts, last: e });
                    }
                    let delay = self.backoff();
                    debug!("Retrying {} in {:?} (attempt {}): {}", kind, delay, attempts, e);
                    sleep(delay).await;
                }
                Err(e) => {
                    error!("Peer error on {}: {}", kind, e);
                    self.notify(LinkEvent::Error {
                        message: e.to_string(),
                    });
                    self.mark_unreachable(e.to_string());
                    return Err(e.into());
                }
            }
        }
    }

    fn backoff(&self) -> Duration {
        let min = self.policy.min_backoff.as_millis() as u64;
        let max = (self.policy.max_backoff.as_millis() as u64).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn mark_reachable(&self) {
        if !self.reachable.swap(true, Ordering::SeqCst) {
            info!("Peer reachable again");
            self.notify(LinkEvent::Reachable);
        }
    }

    fn mark_unreachable(&self, reason: String) {
        if self.reachable.swap(false, Ordering::SeqCst) {
            warn!("Peer marked unreachable: {}", reason);
            self.notify(LinkEvent::Unreachable { reason });
        }
    }

    fn notify(&self, event: LinkEvent) {
        // No subscribers is fine
        let _ = self.link_tx.send(event);
    }
}
