//! Background tasks module
//!
//! Loops that run alongside the HTTP server: the engine ticker, the store
//! writer, the authority's periodic sync push, and both directions of the
//! peer link.

pub mod engine_ticker;
pub mod peer_link;
pub mod store_writer;
pub mod sync_push;

// Re-export main functions
pub use engine_ticker::engine_ticker_task;
pub use peer_link::{peer_inbound_task, peer_link_monitor_task, peer_outbound_task};
pub use store_writer::store_writer_task;
pub use sync_push::sync_push_task;
