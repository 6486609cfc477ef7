//! Ordered collection of timer groups with a single global selection
//!
//! Structural operations take index paths and panic on contract violations;
//! callers check [`TimerModel::can_insert_timer`] or [`TimerModel::is_valid`]
//! first. Removing the last timer of a group drops the group, which shifts
//! every later section down by one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    timer::Timer,
    timer_engine::{TimerConfig, TimerEngine, TimerEvent, TimerId, TimerMode},
    timer_group::TimerGroup,
};

/// Position of a timer: group index and index within the group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexPath {
    pub section: usize,
    pub item: usize,
}

impl IndexPath {
    pub fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimerModel {
    groups: Vec<TimerGroup>,
    selected: Option<TimerId>,
}

impl TimerModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from groups, dropping any that are empty. The first selected id
    /// that exists in the groups wins.
    pub fn from_groups(groups: Vec<TimerGroup>, selected: Option<TimerId>) -> Self {
        let mut model = Self {
            groups,
            selected: None,
        };
        model.prune_empty_groups();
        if let Some(id) = selected {
            model.set_selected(id, true);
        }
        model
    }

    /// Number of groups
    pub fn count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn timer_count(&self) -> usize {
        self.groups.iter().map(TimerGroup::len).sum()
    }

    pub fn groups(&self) -> &[TimerGroup] {
        &self.groups
    }

    pub fn group(&self, section: usize) -> Option<&TimerGroup> {
        self.groups.get(section)
    }

    pub fn group_mut(&mut self, section: usize) -> Option<&mut TimerGroup> {
        self.groups.get_mut(section)
    }

    /// All timers in group order
    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.groups.iter().flat_map(|g| g.timers().iter())
    }

    pub fn timer(&self, id: TimerId) -> Option<&Timer> {
        self.timers().find(|t| t.id() == id)
    }

    pub fn timer_mut(&mut self, id: TimerId) -> Option<&mut Timer> {
        self.groups
            .iter_mut()
            .flat_map(|g| g.timers_mut().iter_mut())
            .find(|t| t.id() == id)
    }

    pub fn timer_at(&self, path: IndexPath) -> Option<&Timer> {
        self.groups.get(path.section).and_then(|g| g.get(path.item))
    }

    pub fn is_valid(&self, path: IndexPath) -> bool {
        self.timer_at(path).is_some()
    }

    /// Linear search; index paths change with every structural operation
    pub fn index_path_of(&self, id: TimerId) -> Option<IndexPath> {
        self.groups.iter().enumerate().find_map(|(section, group)| {
            group.position(id).map(|item| IndexPath { section, item })
        })
    }

    // --- selection ---

    pub fn is_selected(&self, id: TimerId) -> bool {
        self.selected == Some(id)
    }

    pub fn selected_timer(&self) -> Option<&Timer> {
        let selected = self.selected?;
        self.timers().find(|t| t.id() == selected)
    }

    pub fn selected_timer_mut(&mut self) -> Option<&mut Timer> {
        let selected = self.selected?;
        self.timer_mut(selected)
    }

    pub fn selected_group(&self) -> Option<&TimerGroup> {
        let selected = self.selected?;
        self.groups.iter().find(|g| g.position(selected).is_some())
    }

    /// Select or deselect a timer. Selecting deselects every other timer.
    /// Returns false for unknown timers.
    pub fn set_selected(&mut self, id: TimerId, selected: bool) -> bool {
        if self.timer(id).is_none() {
            return false;
        }
        if selected {
            self.deselect_all_timers(Some(id));
            self.selected = Some(id);
            debug!("Selected timer {}", id);
        } else if self.selected == Some(id) {
            self.selected = None;
        }
        true
    }

    pub fn deselect_all_timers(&mut self, except: Option<TimerId>) {
        if self.selected != except {
            self.selected = None;
        }
    }

    // --- structure ---

    /// Whether a timer may be placed at `at`, optionally coming from `from`.
    ///
    /// `at` may name an existing group with room, or one past the last group
    /// with item 0 to open a new group. A full group only accepts a reorder of
    /// one of its own timers.
    pub fn can_insert_timer(&self, at: IndexPath, from: Option<IndexPath>) -> bool {
        match self.groups.get(at.section) {
            Some(group) => {
                let same_group = from.is_some_and(|f| f.section == at.section && self.is_valid(f));
                if same_group {
                    at.item <= group.len()
                } else {
                    !group.is_full() && at.item <= group.len()
                }
            }
            None => at.section == self.groups.len() && at.item == 0,
        }
    }

    /// Create a timer at `at`, opening a new group when `at.section` is one
    /// past the last group.
    pub fn create_new_timer(&mut self, at: IndexPath, config: TimerConfig) -> TimerId {
        assert!(
            self.can_insert_timer(at, None),
            "cannot create a timer at {at:?}"
        );
        if at.section == self.groups.len() {
            self.groups.push(TimerGroup::new());
        }
        let engine = TimerEngine::new(config);
        let id = engine.id();
        let group = &mut self.groups[at.section];
        group.insert_timer(at.item, Timer::new(group.id(), engine));
        info!("Created timer {} at {:?}", id, at);
        id
    }

    /// Remove the timer at `from`. If it was selected, the selection moves to
    /// the same item (clamped) of the same group, or of the last group when
    /// the removal emptied its group.
    pub fn remove_timer(&mut self, from: IndexPath) -> Timer {
        assert!(self.is_valid(from), "no timer at {from:?}");
        let timer = self.groups[from.section].take_timer(from.item);
        let was_selected = self.selected == Some(timer.id());
        let group_survived = !self.groups[from.section].is_empty();
        self.prune_empty_groups();

        if was_selected {
            self.selected = None;
            let section = if group_survived {
                Some(from.section)
            } else {
                self.groups.len().checked_sub(1)
            };
            if let Some(group) = section.and_then(|s| self.groups.get(s)) {
                let item = from.item.min(group.len() - 1);
                self.selected = Some(group.timers()[item].id());
            }
        }
        info!("Removed timer {} from {:?}", timer.id(), from);
        timer
    }

    /// Remove a timer by id
    pub fn delete_timer(&mut self, id: TimerId) -> Option<Timer> {
        let path = self.index_path_of(id)?;
        Some(self.remove_timer(path))
    }

    /// Move a timer, opening a destination group if needed, then prune any
    /// group the move emptied. Selection follows the timer.
    pub fn move_timer(&mut self, from: IndexPath, to: IndexPath) {
        assert!(self.is_valid(from), "no timer at {from:?}");
        assert!(
            self.can_insert_timer(to, Some(from)),
            "cannot move a timer from {from:?} to {to:?}"
        );
        let timer = self.groups[from.section].take_timer(from.item);
        let id = timer.id();
        if to.section == self.groups.len() {
            self.groups.push(TimerGroup::new());
        }
        self.groups[to.section].insert_timer(to.item, timer);
        self.prune_empty_groups();
        info!("Moved timer {} from {:?} to {:?}", id, from, to);
    }

    fn prune_empty_groups(&mut self) {
        let before = self.groups.len();
        self.groups.retain(|g| !g.is_empty());
        if self.groups.len() != before {
            debug!("Pruned {} empty group(s)", before - self.groups.len());
        }
        if self.selected.is_some_and(|id| self.timer(id).is_none()) {
            self.selected = None;
        }
    }

    // --- time ---

    /// Advance every running engine to `now` and collect their events. A
    /// timer that reaches its alarm hands over to the next timer in its group,
    /// carrying the selection with it.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        for group in &mut self.groups {
            let group_id = group.id();
            let transition_sound = group.transition_sound_filename.clone();
            let timers = group.timers_mut();
            for index in 0..timers.len() {
                let was_running = timers[index].engine().is_running();
                timers[index].engine_mut().advance(now);
                events.extend(timers[index].engine_mut().drain_events());

                let finished = was_running && timers[index].mode() == TimerMode::Alarm;
                if !finished || index + 1 >= timers.len() {
                    continue;
                }
                let from = timers[index].id();
                let next = &mut timers[index + 1];
                next.start(now);
                events.extend(next.engine_mut().drain_events());
                events.push(TimerEvent::SequenceAdvanced {
                    group: group_id,
                    from,
                    to: next.id(),
                    transition_sound: transition_sound.clone(),
                });
                if self.selected == Some(from) {
                    self.selected = Some(next.id());
                }
                debug!("Group {} advanced from {} to {}", group_id, from, next.id());
            }
        }
        events
    }

    /// Pending events from every engine, in group order
    pub fn drain_events(&mut self) -> Vec<TimerEvent> {
        self.groups
            .iter_mut()
            .flat_map(|g| g.timers_mut().iter_mut())
            .flat_map(|t| t.engine_mut().drain_events())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn config(starting: u32) -> TimerConfig {
        TimerConfig::new(starting, 0, 0)
    }

    /// Model with the given number of timers per group
    fn model_with(shape: &[usize]) -> TimerModel {
        let mut model = TimerModel::new();
        for (section, &count) in shape.iter().enumerate() {
            for item in 0..count {
                model.create_new_timer(IndexPath::new(section, item), config(60));
            }
        }
        model
    }

    fn shape(model: &TimerModel) -> Vec<usize> {
        model.groups().iter().map(TimerGroup::len).collect()
    }

    #[test]
    fn test_create_and_lookup() {
        let mut model = model_with(&[1]);
        let second = model.create_new_timer(IndexPath::new(0, 1), config(5));
        assert_eq!(shape(&model), vec![2]);
        assert_eq!(model.index_path_of(second), Some(IndexPath::new(0, 1)));

        let third = model.create_new_timer(IndexPath::new(1, 0), config(5));
        assert_eq!(shape(&model), vec![2, 1]);
        assert_eq!(model.timer(third).unwrap().group(), model.group(1).unwrap().id());
    }

    #[test]
    fn test_can_insert_timer() {
        let model = model_with(&[4, 2]);
        assert!(!model.can_insert_timer(IndexPath::new(0, 0), None));
        assert!(!model.can_insert_timer(IndexPath::new(0, 1), Some(IndexPath::new(1, 0))));
        assert!(model.can_insert_timer(IndexPath::new(0, 3), Some(IndexPath::new(0, 0))));
        assert!(model.can_insert_timer(IndexPath::new(1, 2), None));
        assert!(!model.can_insert_timer(IndexPath::new(1, 3), None));
        assert!(model.can_insert_timer(IndexPath::new(2, 0), None));
        assert!(!model.can_insert_timer(IndexPath::new(2, 1), None));
        assert!(!model.can_insert_timer(IndexPath::new(3, 0), None));
    }

    #[test]
    #[should_panic]
    fn test_create_in_full_group_panics() {
        let mut model = model_with(&[4]);
        model.create_new_timer(IndexPath::new(0, 2), config(5));
    }

    #[test]
    fn test_selection_is_exclusive() {
        let mut model = model_with(&[2, 1]);
        let a = model.timer_at(IndexPath::new(0, 0)).unwrap().id();
        let c = model.timer_at(IndexPath::new(1, 0)).unwrap().id();

        assert!(model.set_selected(a, true));
        assert!(model.set_selected(c, true));
        assert!(!model.is_selected(a));
        assert_eq!(model.selected_timer().map(Timer::id), Some(c));
        assert_eq!(model.selected_group().map(TimerGroup::id), Some(model.group(1).unwrap().id()));

        assert!(model.set_selected(c, false));
        assert!(model.selected_timer().is_none());
        assert!(!model.set_selected(TimerId::new(), true));
    }

    #[test]
    fn test_remove_emptying_group_shifts_sections() {
        let mut model = model_with(&[2, 1, 3]);
        let moved = model.timer_at(IndexPath::new(2, 1)).unwrap().id();
        let selected = model.timer_at(IndexPath::new(0, 1)).unwrap().id();
        model.set_selected(selected, true);

        model.remove_timer(IndexPath::new(1, 0));
        assert_eq!(model.count(), 2);
        assert_eq!(model.index_path_of(moved), Some(IndexPath::new(1, 1)));
        assert!(model.is_selected(selected));
    }

    #[test]
    fn test_removed_selection_moves_to_neighbour() {
        let mut model = model_with(&[3]);
        let last = model.timer_at(IndexPath::new(0, 2)).unwrap().id();
        let middle = model.timer_at(IndexPath::new(0, 1)).unwrap().id();
        model.set_selected(last, true);

        model.remove_timer(IndexPath::new(0, 2));
        assert_eq!(model.selected_timer().map(Timer::id), Some(middle));
    }

    #[test]
    fn test_removed_selection_moves_to_last_group_when_group_vanishes() {
        let mut model = model_with(&[2, 1, 2]);
        let only = model.timer_at(IndexPath::new(1, 0)).unwrap().id();
        model.set_selected(only, true);

        model.remove_timer(IndexPath::new(1, 0));
        let expected = model.timer_at(IndexPath::new(1, 0)).unwrap().id();
        assert_eq!(model.selected_timer().map(Timer::id), Some(expected));

        let mut model = model_with(&[1]);
        let id = model.timer_at(IndexPath::new(0, 0)).unwrap().id();
        model.set_selected(id, true);
        model.remove_timer(IndexPath::new(0, 0));
        assert!(model.is_empty());
        assert!(model.selected_timer().is_none());
    }

    #[test]
    fn test_delete_by_id_reassigns_selection() {
        let mut model = model_with(&[2, 1]);
        let first = model.timer_at(IndexPath::new(0, 0)).unwrap().id();
        let second = model.timer_at(IndexPath::new(0, 1)).unwrap().id();
        let lone = model.timer_at(IndexPath::new(1, 0)).unwrap().id();
        model.set_selected(first, true);

        let removed = model.delete_timer(first).expect("timer exists");
        assert_eq!(removed.id(), first);
        assert_eq!(model.timer_count(), 2);
        assert_eq!(model.index_path_of(second), Some(IndexPath::new(0, 0)));
        assert_eq!(model.selected_timer().map(Timer::id), Some(second));

        // Deleting the only timer of a group drops it; selection stays put
        model.delete_timer(lone);
        assert_eq!(model.count(), 1);
        assert!(model.is_selected(second));

        assert!(model.delete_timer(first).is_none());
        model.delete_timer(second);
        assert!(model.is_empty());
        assert!(model.selected_timer().is_none());
    }

    #[test]
    fn test_move_across_groups_prunes_source() {
        let mut model = model_with(&[1, 2]);
        let id = model.timer_at(IndexPath::new(0, 0)).unwrap().id();
        model.set_selected(id, true);

        model.move_timer(IndexPath::new(0, 0), IndexPath::new(1, 2));
        assert_eq!(shape(&model), vec![3]);
        assert_eq!(model.timer_count(), 3);
        assert_eq!(model.index_path_of(id), Some(IndexPath::new(0, 2)));
        assert_eq!(model.timer(id).unwrap().group(), model.group(0).unwrap().id());
        assert_eq!(model.timers().filter(|t| model.is_selected(t.id())).count(), 1);
    }

    #[test]
    fn test_move_to_new_group_and_reorder_full_group() {
        let mut model = model_with(&[4]);
        let first = model.timer_at(IndexPath::new(0, 0)).unwrap().id();

        model.move_timer(IndexPath::new(0, 0), IndexPath::new(0, 3));
        assert_eq!(model.index_path_of(first), Some(IndexPath::new(0, 3)));

        model.move_timer(IndexPath::new(0, 3), IndexPath::new(1, 0));
        assert_eq!(shape(&model), vec![3, 1]);
        assert_eq!(model.timer(first).unwrap().group(), model.group(1).unwrap().id());
    }

    #[test]
    fn test_advance_hands_over_within_group() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut model = TimerModel::new();
        let first = model.create_new_timer(IndexPath::new(0, 0), config(2));
        let second = model.create_new_timer(IndexPath::new(0, 1), config(5));
        model.group_mut(0).unwrap().transition_sound_filename = Some("chime.aiff".into());
        model.set_selected(first, true);
        model.timer_mut(first).unwrap().start(t0);
        model.drain_events();

        let events = model.advance(t0 + Duration::seconds(2));
        assert!(events.contains(&TimerEvent::SequenceAdvanced {
            group: model.group(0).unwrap().id(),
            from: first,
            to: second,
            transition_sound: Some("chime.aiff".into()),
        }));
        assert_eq!(model.timer(first).unwrap().mode(), TimerMode::Alarm);
        assert_eq!(model.timer(second).unwrap().mode(), TimerMode::Countdown);
        assert!(model.is_selected(second));
    }

    #[test]
    fn test_from_groups_drops_empty_groups() {
        let mut full = TimerGroup::new();
        let id = full.add_timer(config(10)).unwrap();
        let model = TimerModel::from_groups(vec![TimerGroup::new(), full], Some(id));
        assert_eq!(model.count(), 1);
        assert!(model.is_selected(id));
    }
}
