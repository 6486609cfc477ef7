//! Peer link background tasks

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, error, info, warn};

use crate::{
    state::AppState,
    sync::{Inbound, LinkEvent, SyncDelegate, SyncMessage},
};

/// Deliver everything queued for the peer, in order. A replica first asks
/// for the authority's model; an authority first pushes its own. While the
/// link is down, a `sync` gets a single attempt instead of the retry budget.
pub async fn peer_outbound_task(state: Arc<AppState>, delegate: Arc<SyncDelegate>) {
    info!(
        "Starting peer outbound task as {} (link {:?})",
        state.role.as_str(),
        delegate.activation_state()
    );

    if state.role.is_authority() {
        match state.model_snapshot() {
            Ok(model) => deliver(&state, &delegate, SyncMessage::TimerModel { model }).await,
            Err(e) => error!("Failed to read model for initial push: {}", e),
        }
    } else {
        match delegate.request(&SyncMessage::RequestContext).await {
            Ok(reply) => apply_reply(&state, reply),
            Err(e) => warn!("Could not fetch context from peer: {}", e),
        }
    }

    loop {
        let message = state.outbox.pop().await;
        deliver(&state, &delegate, message).await;
    }
}

async fn deliver(state: &AppState, delegate: &SyncDelegate, message: SyncMessage) {
    let result = match &message {
        SyncMessage::TimerModel { .. } => delegate.push_context(&message).await.map(|_| None),
        SyncMessage::Sync { .. } if !delegate.is_reachable() => delegate.send_once(&message).await,
        _ => delegate.send(&message).await,
    };
    match result {
        Ok(Some(reply)) => apply_reply(state, reply),
        Ok(None) => debug!("Delivered {} to peer", message.kind()),
        Err(e) => warn!("Failed to deliver {} to peer: {}", message.kind(), e),
    }
}

fn apply_reply(state: &AppState, reply: SyncMessage) {
    debug!("Applying {} reply from peer", reply.kind());
    match state.handle_peer_message(reply, Utc::now()) {
        Ok(Some(unexpected)) => debug!("Dropping nested reply {}", unexpected.kind()),
        Ok(None) => {}
        Err(e) => error!("Failed to apply peer reply: {}", e),
    }
}

/// Apply messages delivered by a transport and answer each one
pub async fn peer_inbound_task(state: Arc<AppState>, mut inbox: mpsc::Receiver<Inbound>) {
    info!("Starting peer inbound task");

    while let Some(inbound) = inbox.recv().await {
        debug!("Peer sent {}", inbound.message.kind());
        let reply = match state.handle_peer_message(inbound.message.clone(), Utc::now()) {
            Ok(reply) => reply,
            Err(e) => {
                error!("Failed to apply peer message: {}", e);
                None
            }
        };
        inbound.respond(reply);
    }

    info!("Peer inbox closed, stopping inbound task");
}

/// Surface link reachability changes in the log
pub async fn peer_link_monitor_task(delegate: Arc<SyncDelegate>) {
    let mut events = delegate.subscribe();
    loop {
        match events.recv().await {
            Ok(LinkEvent::Reachable) => info!("Peer link is up"),
            Ok(LinkEvent::Unreachable { reason }) => warn!("Peer link is down: {}", reason),
            Ok(LinkEvent::Error { message }) => error!("Peer link error: {}", message),
            Err(RecvError::Lagged(skipped)) => debug!("Missed {} link events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
