//! State management module
//!
//! The timer engine, the timer/group/model aggregate, their dictionary form,
//! and the process-wide state that wires the model to observers.

pub mod app_state;
pub mod persisted;
pub mod time_value;
pub mod timer;
pub mod timer_engine;
pub mod timer_group;
pub mod timer_model;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, StateError};
pub use persisted::{epoch_seconds, from_epoch_seconds};
pub use time_value::{clamp_total_seconds, to_total_seconds, ParseTimeError, TimeValue, MAX_TOTAL_SECONDS};
pub use timer::Timer;
pub use timer_engine::{TimerConfig, TimerEngine, TimerEvent, TimerId, TimerMode};
pub use timer_group::{DisplayType, GroupId, SoundType, TimerGroup, MAX_TIMERS_PER_GROUP};
pub use timer_model::{IndexPath, TimerModel};
pub use timer_state::TimerState;
