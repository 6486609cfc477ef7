//! Peer synchronization
//!
//! Message taxonomy, transports, the outbound queue, delivery policy and the
//! rules for applying inbound messages to the local model.

pub mod channel;
pub mod delegate;
pub mod messages;
pub mod outbox;
pub mod reconcile;

use clap::ValueEnum;
use serde::Serialize;

pub use channel::{ActivationState, ChannelError, Inbound, MemoryChannel, PeerChannel, Transience};
pub use delegate::{LinkEvent, SyncDelegate, SyncError, SyncPolicy};
pub use messages::{Command, CommandError, SyncMessage};
pub use outbox::PeerOutbox;
pub use reconcile::{apply_message, Reconciled};

/// Which side of the link holds the true running timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncRole {
    #[default]
    Authority,
    Replica,
}

impl SyncRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRole::Authority => "authority",
            SyncRole::Replica => "replica",
        }
    }

    pub fn is_authority(&self) -> bool {
        matches!(self, SyncRole::Authority)
    }
}
