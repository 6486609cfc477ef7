//! Single countdown timer state machine
//!
//! The engine never reads the wall clock. Every time-dependent operation
//! takes `now`, and whole-second ticks are derived from an anchor recorded
//! when the countdown was (re)started or synchronized. Tick and transition
//! notifications are buffered as [`TimerEvent`]s and drained by the owner.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::time_value::clamp_total_seconds;
use super::timer_group::GroupId;

/// Stable identifier of a timer (shared by the engine and its wrapper)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(Uuid);

impl TimerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    /// Never started, or stopped; `current_time == starting`
    #[default]
    Idle,
    Countdown,
    Warning,
    Final,
    /// Reached zero
    Alarm,
    Paused,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Idle => "idle",
            TimerMode::Countdown => "countdown",
            TimerMode::Warning => "warning",
            TimerMode::Final => "final",
            TimerMode::Alarm => "alarm",
            TimerMode::Paused => "paused",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "idle" => Some(TimerMode::Idle),
            "countdown" => Some(TimerMode::Countdown),
            "warning" => Some(TimerMode::Warning),
            "final" => Some(TimerMode::Final),
            "alarm" => Some(TimerMode::Alarm),
            "paused" => Some(TimerMode::Paused),
            _ => None,
        }
    }

    /// True for the three counting states
    pub fn is_running(&self) -> bool {
        matches!(self, TimerMode::Countdown | TimerMode::Warning | TimerMode::Final)
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications produced by engines and the model
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    /// One whole second elapsed
    Tick { timer: TimerId, current_time: u32 },
    Transition {
        timer: TimerId,
        from: TimerMode,
        to: TimerMode,
    },
    /// A timer finished and the next timer in its group took over
    SequenceAdvanced {
        group: GroupId,
        from: TimerId,
        to: TimerId,
        transition_sound: Option<String>,
    },
}

/// Threshold configuration, all in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerConfig {
    pub starting_time_in_seconds: u32,
    pub warning_time_in_seconds: u32,
    pub final_time_in_seconds: u32,
}

impl TimerConfig {
    pub fn new(starting: u32, warning: u32, final_time: u32) -> Self {
        Self {
            starting_time_in_seconds: starting,
            warning_time_in_seconds: warning,
            final_time_in_seconds: final_time,
        }
    }
}

/// `seconds` remaining were exact at `date`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Anchor {
    pub(crate) date: DateTime<Utc>,
    pub(crate) seconds: u32,
}

#[derive(Debug, Clone)]
pub struct TimerEngine {
    pub(crate) id: TimerId,
    pub(crate) starting_time_in_seconds: u32,
    pub(crate) warning_time_in_seconds: u32,
    pub(crate) final_time_in_seconds: u32,
    pub(crate) current_time: u32,
    pub(crate) mode: TimerMode,
    pub(crate) paused_from: Option<TimerMode>,
    /// Part of the current second already consumed when paused
    pub(crate) paused_offset: Option<Duration>,
    pub(crate) anchor: Option<Anchor>,
    events: Vec<TimerEvent>,
}

impl TimerEngine {
    pub fn new(config: TimerConfig) -> Self {
        Self::with_id(TimerId::new(), config)
    }

    pub fn with_id(id: TimerId, config: TimerConfig) -> Self {
        let mut engine = Self {
            id,
            starting_time_in_seconds: 0,
            warning_time_in_seconds: 0,
            final_time_in_seconds: 0,
            current_time: 0,
            mode: TimerMode::Idle,
            paused_from: None,
            paused_offset: None,
            anchor: None,
            events: Vec::new(),
        };
        engine.apply_config(config);
        engine.current_time = engine.starting_time_in_seconds;
        engine
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn current_time(&self) -> u32 {
        self.current_time
    }

    pub fn starting_time_in_seconds(&self) -> u32 {
        self.starting_time_in_seconds
    }

    pub fn warning_time_in_seconds(&self) -> u32 {
        self.warning_time_in_seconds
    }

    pub fn final_time_in_seconds(&self) -> u32 {
        self.final_time_in_seconds
    }

    /// Mode that was interrupted by the current pause, if any
    pub fn paused_from(&self) -> Option<TimerMode> {
        self.paused_from
    }

    pub fn is_running(&self) -> bool {
        self.mode.is_running()
    }

    pub fn config(&self) -> TimerConfig {
        TimerConfig::new(
            self.starting_time_in_seconds,
            self.warning_time_in_seconds,
            self.final_time_in_seconds,
        )
    }

    pub fn apply_config(&mut self, config: TimerConfig) {
        self.set_starting_time(config.starting_time_in_seconds as i64);
        self.set_warning_time(config.warning_time_in_seconds as i64);
        self.set_final_time(config.final_time_in_seconds as i64);
    }

    /// Change the starting time; thresholds and the current value are pulled
    /// down to stay within it.
    pub fn set_starting_time(&mut self, seconds: i64) {
        self.starting_time_in_seconds = clamp_total_seconds(seconds);
        self.warning_time_in_seconds = self.warning_time_in_seconds.min(self.starting_time_in_seconds);
        self.final_time_in_seconds = self.final_time_in_seconds.min(self.starting_time_in_seconds);
        if self.mode == TimerMode::Idle {
            self.current_time = self.starting_time_in_seconds;
        } else {
            self.current_time = self.current_time.min(self.starting_time_in_seconds);
        }
    }

    pub fn set_warning_time(&mut self, seconds: i64) {
        self.warning_time_in_seconds = clamp_total_seconds(seconds).min(self.starting_time_in_seconds);
    }

    pub fn set_final_time(&mut self, seconds: i64) {
        self.final_time_in_seconds = clamp_total_seconds(seconds).min(self.starting_time_in_seconds);
    }

    /// Running classification of a remaining-seconds value. Thresholds are
    /// inclusive and a zero threshold disables its tier.
    pub(crate) fn classify(&self, remaining: u32) -> TimerMode {
        if remaining == 0 {
            TimerMode::Alarm
        } else if self.final_time_in_seconds > 0 && remaining <= self.final_time_in_seconds {
            TimerMode::Final
        } else if self.warning_time_in_seconds > 0 && remaining <= self.warning_time_in_seconds {
            TimerMode::Warning
        } else {
            TimerMode::Countdown
        }
    }

    fn set_mode(&mut self, to: TimerMode) {
        if to == self.mode {
            return;
        }
        let from = self.mode;
        self.mode = to;
        debug!("Timer {} transition {} -> {}", self.id, from, to);
        self.events.push(TimerEvent::Transition {
            timer: self.id,
            from,
            to,
        });
    }

    /// Begin counting from `current_time`, anchored at `date`.
    fn run_from(&mut self, date: DateTime<Utc>) {
        self.paused_from = None;
        self.paused_offset = None;
        let to = self.classify(self.current_time);
        self.anchor = to.is_running().then_some(Anchor {
            date,
            seconds: self.current_time,
        });
        self.set_mode(to);
    }

    /// Restart the countdown from the starting time
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.current_time = self.starting_time_in_seconds;
        self.run_from(now);
    }

    fn step(&mut self) {
        if !self.mode.is_running() || self.current_time == 0 {
            return;
        }
        self.current_time -= 1;
        self.events.push(TimerEvent::Tick {
            timer: self.id,
            current_time: self.current_time,
        });
        let next = self.classify(self.current_time);
        if next == TimerMode::Alarm {
            self.anchor = None;
        }
        self.set_mode(next);
    }

    /// Apply exactly one second of countdown, regardless of the clock
    pub fn tick(&mut self) {
        if !self.mode.is_running() {
            return;
        }
        if let Some(anchor) = self.anchor.as_mut() {
            anchor.seconds = anchor.seconds.saturating_sub(1);
        }
        self.step();
    }

    /// Apply one tick per whole second elapsed since the anchor. Returns the
    /// number of ticks applied.
    pub fn advance(&mut self, now: DateTime<Utc>) -> u32 {
        if !self.mode.is_running() {
            return 0;
        }
        let anchor = *self.anchor.get_or_insert(Anchor {
            date: now,
            seconds: self.current_time,
        });
        let elapsed = (now - anchor.date).num_seconds().max(0);
        let target = (anchor.seconds as i64 - elapsed).max(0) as u32;

        let mut applied = 0;
        while self.mode.is_running() && self.current_time > target {
            self.step();
            applied += 1;
        }
        applied
    }

    /// Sub-second remaining time while counting
    pub fn current_precise_time(&self, now: DateTime<Utc>) -> Option<f64> {
        if !self.mode.is_running() {
            return None;
        }
        let precise = match self.anchor {
            Some(anchor) => {
                let elapsed = (now - anchor.date).num_milliseconds() as f64 / 1000.0;
                anchor.seconds as f64 - elapsed
            }
            None => self.current_time as f64,
        };
        Some(precise.clamp(0.0, self.starting_time_in_seconds as f64))
    }

    /// `(current_time, date)` pair at which `current_time` was exact; this is
    /// what an authority sends to its peer.
    pub fn sync_point(&self, now: DateTime<Utc>) -> (u32, DateTime<Utc>) {
        match self.anchor {
            Some(anchor) if self.mode.is_running() => {
                let consumed = anchor.seconds.saturating_sub(self.current_time);
                (self.current_time, anchor.date + Duration::seconds(consumed as i64))
            }
            _ => (self.current_time, now),
        }
    }

    /// Suspend a running countdown. Returns the dictionary form of the state
    /// just before pausing.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<serde_json::Value> {
        self.advance(now);
        if !self.mode.is_running() {
            return None;
        }
        let snapshot = self.to_dictionary();
        self.paused_from = Some(self.mode);
        self.paused_offset = self.anchor.map(|anchor| {
            Duration::milliseconds((now - anchor.date).num_milliseconds().max(0) % 1000)
        });
        self.anchor = None;
        self.set_mode(TimerMode::Paused);
        Some(snapshot)
    }

    /// Continue from a pause, or from a supplied serialized state. Returns
    /// false when neither applies. A plain resume picks up mid-second where
    /// the pause left off.
    pub fn resume(&mut self, state: Option<&serde_json::Value>, now: DateTime<Utc>) -> bool {
        let anchor_date = match state {
            Some(state) => {
                self.restore(state);
                now
            }
            None if self.mode == TimerMode::Paused => now - self.paused_offset.unwrap_or_else(Duration::zero),
            None => return false,
        };
        self.run_from(anchor_date);
        true
    }

    /// Back to idle at the starting time
    pub fn stop(&mut self) {
        self.current_time = self.starting_time_in_seconds;
        self.anchor = None;
        self.paused_from = None;
        self.paused_offset = None;
        self.set_mode(TimerMode::Idle);
    }

    pub fn reset(&mut self) {
        self.stop();
    }

    /// Jump straight to the alarm
    pub fn end(&mut self) {
        self.current_time = 0;
        self.anchor = None;
        self.paused_from = None;
        self.paused_offset = None;
        self.set_mode(TimerMode::Alarm);
    }

    /// Force the remaining time to `to` as measured at `date`, starting the
    /// countdown if it is not already running.
    pub fn sync(&mut self, to: i64, date: DateTime<Utc>, now: DateTime<Utc>) {
        self.current_time = clamp_total_seconds(to).min(self.starting_time_in_seconds);
        self.run_from(date);
        self.advance(now);
    }

    pub fn drain_events(&mut self) -> Vec<TimerEvent> {
        std::mem::take(&mut self.events)
    }
}
