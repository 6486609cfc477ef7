//! Countdown Sync - countdown timers mirrored between two devices
//!
//! This library provides the timer engine and its group/model aggregate, the
//! peer protocol that keeps an authority and a replica in step, and a small
//! HTTP control surface over both.

pub mod api;
pub mod config;
pub mod services;
pub mod state;
pub mod sync;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use state::AppState;
pub use utils::signals::shutdown_signal;
