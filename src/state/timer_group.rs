//! Ordered group of up to four timers with shared display and sound settings

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{
    timer::Timer,
    timer_engine::{TimerConfig, TimerEngine, TimerId},
};

pub const MAX_TIMERS_PER_GROUP: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How the timers of a group are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayType {
    #[default]
    Numerical,
    Circular,
    Stoplights,
}

impl DisplayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayType::Numerical => "numerical",
            DisplayType::Circular => "circular",
            DisplayType::Stoplights => "stoplights",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "numerical" => Some(DisplayType::Numerical),
            "circular" => Some(DisplayType::Circular),
            "stoplights" => Some(DisplayType::Stoplights),
            _ => None,
        }
    }
}

/// Alarm sound for a group
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SoundType {
    #[default]
    None,
    Vibrate,
    Sound(String),
    SoundVibrate(String),
}

impl SoundType {
    pub fn tag(&self) -> &'static str {
        match self {
            SoundType::None => "none",
            SoundType::Vibrate => "vibrate",
            SoundType::Sound(_) => "sound",
            SoundType::SoundVibrate(_) => "soundVibrate",
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            SoundType::Sound(file) | SoundType::SoundVibrate(file) => Some(file),
            _ => None,
        }
    }

    /// Rebuild from a stored tag and filename. A sound tag without a file
    /// degrades to the nearest silent variant.
    pub fn from_parts(tag: &str, filename: Option<&str>) -> Self {
        let file = filename.filter(|f| !f.is_empty()).map(str::to_string);
        match (tag, file) {
            ("vibrate", _) => SoundType::Vibrate,
            ("sound", Some(file)) => SoundType::Sound(file),
            ("soundVibrate", Some(file)) => SoundType::SoundVibrate(file),
            ("soundVibrate", None) => SoundType::Vibrate,
            _ => SoundType::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimerGroup {
    id: GroupId,
    timers: Vec<Timer>,
    pub display_type: DisplayType,
    pub sound_type: SoundType,
    /// Played when one timer hands over to the next
    pub transition_sound_filename: Option<String>,
}

impl TimerGroup {
    pub fn new() -> Self {
        Self::with_id(GroupId::new())
    }

    pub fn with_id(id: GroupId) -> Self {
        Self {
            id,
            timers: Vec::new(),
            display_type: DisplayType::default(),
            sound_type: SoundType::default(),
            transition_sound_filename: None,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.timers.len() >= MAX_TIMERS_PER_GROUP
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    pub fn get(&self, index: usize) -> Option<&Timer> {
        self.timers.get(index)
    }

    pub(crate) fn timers_mut(&mut self) -> &mut [Timer] {
        &mut self.timers
    }

    pub fn position(&self, timer: TimerId) -> Option<usize> {
        self.timers.iter().position(|t| t.id() == timer)
    }

    /// Append a new timer. Returns `None` when the group is already full.
    pub fn add_timer(&mut self, config: TimerConfig) -> Option<TimerId> {
        if self.is_full() {
            debug!("Group {} is full, not adding a timer", self.id);
            return None;
        }
        let engine = TimerEngine::new(config);
        let id = engine.id();
        self.timers.push(Timer::new(self.id, engine));
        Some(id)
    }

    /// Remove the timer at `index`, or `None` when out of range
    pub fn delete_timer(&mut self, index: usize) -> Option<Timer> {
        (index < self.timers.len()).then(|| self.timers.remove(index))
    }

    /// Panics when out of range
    pub(crate) fn take_timer(&mut self, index: usize) -> Timer {
        self.timers.remove(index)
    }

    /// Insert at `index` (clamped to the end), taking over the timer's group
    /// reference.
    pub(crate) fn insert_timer(&mut self, index: usize, mut timer: Timer) {
        assert!(!self.is_full(), "group {} cannot hold more than {} timers", self.id, MAX_TIMERS_PER_GROUP);
        timer.set_group(self.id);
        let index = index.min(self.timers.len());
        self.timers.insert(index, timer);
    }
}

impl Default for TimerGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        let mut group = TimerGroup::new();
        for _ in 0..MAX_TIMERS_PER_GROUP {
            assert!(group.add_timer(TimerConfig::new(60, 10, 5)).is_some());
        }
        assert!(group.is_full());
        assert!(group.add_timer(TimerConfig::default()).is_none());
        assert_eq!(group.len(), 4);
        assert!(group.timers().iter().all(|t| t.group() == group.id()));
    }

    #[test]
    fn test_delete_out_of_range() {
        let mut group = TimerGroup::new();
        let id = group.add_timer(TimerConfig::new(5, 0, 0)).unwrap();
        assert!(group.delete_timer(1).is_none());
        assert_eq!(group.delete_timer(0).map(|t| t.id()), Some(id));
        assert!(group.is_empty());
    }

    #[test]
    fn test_sound_type_fallbacks() {
        assert_eq!(SoundType::from_parts("sound", Some("")), SoundType::None);
        assert_eq!(SoundType::from_parts("soundVibrate", None), SoundType::Vibrate);
        assert_eq!(
            SoundType::from_parts("sound", Some("bell.aiff")),
            SoundType::Sound("bell.aiff".into())
        );
        assert_eq!(SoundType::from_parts("bogus", Some("bell.aiff")), SoundType::None);
        assert_eq!(SoundType::SoundVibrate("x".into()).tag(), "soundVibrate");
    }
}
