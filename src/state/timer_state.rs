//! Snapshot of the selected timer, published to observers

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Timer, TimerId, TimerMode};

/// What observers see of the selected timer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub timer_id: Option<TimerId>,
    pub mode: TimerMode,
    pub active: bool,
    pub remaining_seconds: Option<u32>,
    pub precise_remaining: Option<f64>,
}

impl TimerState {
    /// Nothing selected
    pub fn new() -> Self {
        Self {
            timer_id: None,
            mode: TimerMode::Idle,
            active: false,
            remaining_seconds: None,
            precise_remaining: None,
        }
    }

    pub fn from_timer(timer: &Timer, now: DateTime<Utc>) -> Self {
        let engine = timer.engine();
        Self {
            timer_id: Some(timer.id()),
            mode: engine.mode(),
            active: engine.is_running(),
            remaining_seconds: Some(engine.current_time()),
            precise_remaining: engine.current_precise_time(now),
        }
    }

    /// Counting down right now
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining_seconds(&self) -> Option<u32> {
        self.remaining_seconds
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{IndexPath, TimerConfig, TimerModel};
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_snapshot_of_running_timer() {
        let now = Utc.with_ymd_and_hms(2024, 2, 2, 9, 0, 0).unwrap();
        let mut model = TimerModel::new();
        let id = model.create_new_timer(IndexPath::new(0, 0), TimerConfig::new(90, 30, 10));
        model.timer_mut(id).unwrap().start(now);

        let later = now + Duration::milliseconds(1_500);
        let state = TimerState::from_timer(model.timer(id).unwrap(), later);
        assert!(state.is_active());
        assert_eq!(state.timer_id, Some(id));
        assert_eq!(state.remaining_seconds(), Some(90));
        assert_eq!(state.precise_remaining, Some(88.5));
        assert_eq!(state.mode, TimerMode::Countdown);
    }

    #[test]
    fn test_idle_snapshot_has_no_precise_time() {
        let now = Utc.with_ymd_and_hms(2024, 2, 2, 9, 0, 0).unwrap();
        let mut model = TimerModel::new();
        let id = model.create_new_timer(IndexPath::new(0, 0), TimerConfig::new(15, 0, 0));
        let state = TimerState::from_timer(model.timer(id).unwrap(), now);
        assert!(!state.is_active());
        assert_eq!(state.precise_remaining, None);
        assert_eq!(TimerState::default().remaining_seconds(), None);
    }
}
