//! External collaborators
//!
//! The key-value store the model is persisted in and the TCP transport for
//! the peer link.

pub mod store;
pub mod tcp_peer;

// Re-export main types
pub use store::{open_store, JsonFileStore, KeyValueStore, MemoryStore, StoreError, MODEL_KEY};
pub use tcp_peer::{serve_peer, TcpPeerChannel};
