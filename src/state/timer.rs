//! Timer wrapper: one engine placed in a group

use chrono::{DateTime, Utc};

use super::{
    timer_engine::{TimerEngine, TimerId, TimerMode},
    timer_group::GroupId,
};

/// A timer as it lives inside a group.
///
/// Selection, index paths and deletion depend on the surrounding model and are
/// answered by [`TimerModel`](super::TimerModel) using [`Timer::id`].
#[derive(Debug, Clone)]
pub struct Timer {
    group: GroupId,
    engine: TimerEngine,
}

impl Timer {
    pub(crate) fn new(group: GroupId, engine: TimerEngine) -> Self {
        Self { group, engine }
    }

    pub fn id(&self) -> TimerId {
        self.engine.id()
    }

    /// Owning group
    pub fn group(&self) -> GroupId {
        self.group
    }

    pub(crate) fn set_group(&mut self, group: GroupId) {
        self.group = group;
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TimerEngine {
        &mut self.engine
    }

    pub fn mode(&self) -> TimerMode {
        self.engine.mode()
    }

    pub fn current_time(&self) -> u32 {
        self.engine.current_time()
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.engine.start(now);
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }
}
