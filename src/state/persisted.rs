//! Dictionary form of engines, groups and the model
//!
//! This is both the persisted form and the `timerModel` wire payload. Groups
//! are written as `{"settings": {...}, "timers": [...]}`; the older header-row
//! layout (`[settings, timer, timer, ...]`) is still accepted when reading.
//! Reading is best-effort: missing or mistyped keys fall back to defaults.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use tracing::warn;

use super::{
    timer::Timer,
    timer_engine::{Anchor, TimerConfig, TimerEngine, TimerId, TimerMode},
    timer_group::{DisplayType, GroupId, SoundType, TimerGroup, MAX_TIMERS_PER_GROUP},
    timer_model::TimerModel,
};

/// Seconds since the Unix epoch, with millisecond precision
pub fn epoch_seconds(date: DateTime<Utc>) -> f64 {
    date.timestamp_millis() as f64 / 1000.0
}

pub fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt((seconds * 1000.0).round() as i64).single()
}

static NULL: Value = Value::Null;

fn get_u32(dict: &Value, key: &str) -> Option<u32> {
    match dict.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n.min(u32::MAX as u64) as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_str<'a>(dict: &'a Value, key: &str) -> Option<&'a str> {
    dict.get(key).and_then(Value::as_str)
}

fn get_bool(dict: &Value, key: &str) -> bool {
    dict.get(key).and_then(Value::as_bool).unwrap_or(false)
}

impl TimerEngine {
    pub fn to_dictionary(&self) -> Value {
        let mut dict = Map::new();
        dict.insert("id".into(), json!(self.id.to_string()));
        dict.insert("startingTimeInSeconds".into(), json!(self.starting_time_in_seconds));
        dict.insert("warningTimeInSeconds".into(), json!(self.warning_time_in_seconds));
        dict.insert("finalTimeInSeconds".into(), json!(self.final_time_in_seconds));
        dict.insert("currentTime".into(), json!(self.current_time));
        dict.insert("mode".into(), json!(self.mode.as_str()));
        if let Some(paused_from) = self.paused_from {
            dict.insert("pausedFrom".into(), json!(paused_from.as_str()));
        }
        if self.mode.is_running() {
            if let Some(anchor) = self.anchor {
                let (_, date) = self.sync_point(anchor.date);
                dict.insert("anchorDate".into(), json!(epoch_seconds(date)));
            }
        }
        Value::Object(dict)
    }

    pub fn from_dictionary(dict: &Value) -> Self {
        let id = get_str(dict, "id")
            .and_then(TimerId::parse)
            .unwrap_or_default();
        let mut engine = Self::with_id(id, TimerConfig::default());
        engine.restore(dict);
        engine
    }

    /// Overwrite configuration and countdown state from a dictionary, keeping
    /// this engine's id. Running states restore their anchor when one was
    /// recorded; the caller advances to the present.
    pub(crate) fn restore(&mut self, dict: &Value) {
        self.mode = TimerMode::Idle;
        self.anchor = None;
        self.paused_from = None;
        self.paused_offset = None;

        let config = TimerConfig::new(
            get_u32(dict, "startingTimeInSeconds").unwrap_or(self.starting_time_in_seconds),
            get_u32(dict, "warningTimeInSeconds").unwrap_or(0),
            get_u32(dict, "finalTimeInSeconds").unwrap_or(0),
        );
        self.apply_config(config);

        let stored_mode = get_str(dict, "mode")
            .and_then(TimerMode::from_tag)
            .unwrap_or_default();
        let current = get_u32(dict, "currentTime")
            .unwrap_or(self.starting_time_in_seconds)
            .min(self.starting_time_in_seconds);

        match stored_mode {
            TimerMode::Idle => {
                self.current_time = self.starting_time_in_seconds;
            }
            TimerMode::Alarm => {
                self.current_time = 0;
                self.mode = TimerMode::Alarm;
            }
            TimerMode::Paused => {
                self.current_time = current;
                self.mode = TimerMode::Paused;
                self.paused_from = get_str(dict, "pausedFrom")
                    .and_then(TimerMode::from_tag)
                    .filter(TimerMode::is_running);
            }
            TimerMode::Countdown | TimerMode::Warning | TimerMode::Final => {
                self.current_time = current;
                self.mode = self.classify(current);
                if self.mode.is_running() {
                    self.anchor = dict
                        .get("anchorDate")
                        .and_then(Value::as_f64)
                        .and_then(from_epoch_seconds)
                        .map(|date| Anchor {
                            date,
                            seconds: current,
                        });
                }
            }
        }
    }
}

impl TimerGroup {
    /// Group-level settings dictionary
    pub fn settings_dictionary(&self) -> Value {
        json!({
            "id": self.id().to_string(),
            "displayType": self.display_type.as_str(),
            "transitionSoundFilename": self.transition_sound_filename.clone().unwrap_or_default(),
            "soundTypeString": self.sound_type.tag(),
            "mainSoundFileName": self.sound_type.filename().unwrap_or_default(),
        })
    }

    fn from_settings(settings: &Value) -> Self {
        let id = get_str(settings, "id")
            .and_then(GroupId::parse)
            .unwrap_or_default();
        let mut group = TimerGroup::with_id(id);
        group.display_type = get_str(settings, "displayType")
            .and_then(DisplayType::from_tag)
            .unwrap_or_default();
        group.sound_type = SoundType::from_parts(
            get_str(settings, "soundTypeString").unwrap_or_default(),
            get_str(settings, "mainSoundFileName"),
        );
        group.transition_sound_filename = get_str(settings, "transitionSoundFilename")
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        group
    }

    /// Restore a group, reporting the first timer flagged as selected
    fn from_persisted(value: &Value, selected: &mut Option<TimerId>) -> Self {
        let (settings, timers): (&Value, Vec<&Value>) = match value {
            Value::Array(rows) => match rows.split_first() {
                Some((header, rest)) => (header, rest.iter().collect()),
                None => (&NULL, Vec::new()),
            },
            other => (
                other.get("settings").unwrap_or(&NULL),
                other
                    .get("timers")
                    .and_then(Value::as_array)
                    .map(|rows| rows.iter().collect())
                    .unwrap_or_default(),
            ),
        };

        let mut group = Self::from_settings(settings);
        if timers.len() > MAX_TIMERS_PER_GROUP {
            warn!(
                "Group {} stored {} timers, keeping the first {}",
                group.id(),
                timers.len(),
                MAX_TIMERS_PER_GROUP
            );
        }
        for row in timers.into_iter().take(MAX_TIMERS_PER_GROUP) {
            let engine = TimerEngine::from_dictionary(row);
            if selected.is_none() && get_bool(row, "isSelected") {
                *selected = Some(engine.id());
            }
            let index = group.len();
            group.insert_timer(index, Timer::new(group.id(), engine));
        }
        group
    }
}

impl TimerModel {
    /// Nested array form used for storage and the `timerModel` message
    pub fn to_persisted(&self) -> Value {
        let groups = self
            .groups()
            .iter()
            .map(|group| {
                let timers: Vec<Value> = group
                    .timers()
                    .iter()
                    .map(|timer| {
                        let mut dict = timer.engine().to_dictionary();
                        if let Value::Object(map) = &mut dict {
                            map.insert("isSelected".into(), json!(self.is_selected(timer.id())));
                        }
                        dict
                    })
                    .collect();
                json!({
                    "settings": group.settings_dictionary(),
                    "timers": timers,
                })
            })
            .collect();
        Value::Array(groups)
    }

    /// Rebuild from [`TimerModel::to_persisted`] output, or the header-row
    /// layout. Anything that is not an array yields an empty model.
    pub fn from_persisted(value: &Value) -> Self {
        let Some(rows) = value.as_array() else {
            warn!("Persisted model is not an array, starting empty");
            return TimerModel::new();
        };
        let mut selected = None;
        let groups = rows
            .iter()
            .map(|row| TimerGroup::from_persisted(row, &mut selected))
            .collect();
        TimerModel::from_groups(groups, selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::timer_model::IndexPath;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 8, 30, 0).unwrap()
    }

    fn assert_same_observable(a: &TimerEngine, b: &TimerEngine) {
        assert_eq!(a.id(), b.id());
        assert_eq!(a.current_time(), b.current_time());
        assert_eq!(a.mode(), b.mode());
        assert_eq!(a.config(), b.config());
    }

    #[test]
    fn test_engine_dictionary_keys() {
        let engine = TimerEngine::new(TimerConfig::new(90, 30, 10));
        let dict = engine.to_dictionary();
        assert_eq!(dict["startingTimeInSeconds"], 90);
        assert_eq!(dict["warningTimeInSeconds"], 30);
        assert_eq!(dict["finalTimeInSeconds"], 10);
        assert_eq!(dict["currentTime"], 90);
        assert_eq!(dict["mode"], "idle");
        assert!(dict.get("anchorDate").is_none());
    }

    #[test]
    fn test_engine_states_restore() {
        let mut engine = TimerEngine::new(TimerConfig::new(90, 30, 10));
        assert_same_observable(&engine, &TimerEngine::from_dictionary(&engine.to_dictionary()));

        engine.start(t0());
        engine.advance(t0() + Duration::seconds(65));
        assert_eq!(engine.mode(), TimerMode::Warning);
        let restored = TimerEngine::from_dictionary(&engine.to_dictionary());
        assert_same_observable(&engine, &restored);
        assert_eq!(restored.sync_point(t0()), engine.sync_point(t0()));

        engine.pause(t0() + Duration::seconds(82));
        let mut restored = TimerEngine::from_dictionary(&engine.to_dictionary());
        assert_same_observable(&engine, &restored);
        assert_eq!(restored.paused_from(), Some(TimerMode::Final));
        assert!(restored.resume(None, t0()));
        assert_eq!(restored.mode(), TimerMode::Final);

        engine.end();
        assert_same_observable(&engine, &TimerEngine::from_dictionary(&engine.to_dictionary()));
    }

    #[test]
    fn test_engine_tolerates_missing_and_mistyped_keys() {
        let engine = TimerEngine::from_dictionary(&json!({
            "startingTimeInSeconds": "120",
            "warningTimeInSeconds": true,
            "mode": "sprinting",
        }));
        assert_eq!(engine.starting_time_in_seconds(), 120);
        assert_eq!(engine.warning_time_in_seconds(), 0);
        assert_eq!(engine.mode(), TimerMode::Idle);
        assert_eq!(engine.current_time(), 120);

        let empty = TimerEngine::from_dictionary(&Value::Null);
        assert_eq!(empty.starting_time_in_seconds(), 0);
    }

    #[test]
    fn test_running_state_with_stale_time_reclassifies() {
        let engine = TimerEngine::from_dictionary(&json!({
            "startingTimeInSeconds": 60,
            "warningTimeInSeconds": 20,
            "currentTime": 0,
            "mode": "countdown",
        }));
        assert_eq!(engine.mode(), TimerMode::Alarm);
    }

    #[test]
    fn test_model_round_trip_keeps_structure_and_selection() {
        let mut model = TimerModel::new();
        model.create_new_timer(IndexPath::new(0, 0), TimerConfig::new(30, 0, 0));
        let selected = model.create_new_timer(IndexPath::new(0, 1), TimerConfig::new(45, 10, 0));
        model.create_new_timer(IndexPath::new(1, 0), TimerConfig::new(5, 0, 0));
        {
            let group = model.group_mut(1).unwrap();
            group.display_type = DisplayType::Stoplights;
            group.sound_type = SoundType::SoundVibrate("gong.caf".into());
            group.transition_sound_filename = Some("tick.caf".into());
        }
        model.set_selected(selected, true);

        let restored = TimerModel::from_persisted(&model.to_persisted());
        assert_eq!(restored.count(), 2);
        assert_eq!(restored.timer_count(), 3);
        assert_eq!(restored.selected_timer().map(Timer::id), Some(selected));
        let group = restored.group(1).unwrap();
        assert_eq!(group.id(), model.group(1).unwrap().id());
        assert_eq!(group.display_type, DisplayType::Stoplights);
        assert_eq!(group.sound_type, SoundType::SoundVibrate("gong.caf".into()));
        assert_eq!(group.transition_sound_filename.as_deref(), Some("tick.caf"));
        assert!(group.timers().iter().all(|t| t.group() == group.id()));
    }

    #[test]
    fn test_header_row_layout_is_accepted() {
        let legacy = json!([
            [
                {"displayType": "circular", "soundTypeString": "sound", "mainSoundFileName": ""},
                {"startingTimeInSeconds": 10, "currentTime": 10, "mode": "idle"},
                {"startingTimeInSeconds": 20, "currentTime": 20, "mode": "idle", "isSelected": true}
            ],
            [
                {"displayType": "numerical"}
            ]
        ]);
        let model = TimerModel::from_persisted(&legacy);
        assert_eq!(model.count(), 1);
        let group = model.group(0).unwrap();
        assert_eq!(group.display_type, DisplayType::Circular);
        assert_eq!(group.sound_type, SoundType::None);
        assert_eq!(model.selected_timer().map(|t| t.current_time()), Some(20));
    }

    #[test]
    fn test_non_array_model_is_empty() {
        assert!(TimerModel::from_persisted(&json!({"groups": []})).is_empty());
    }
}
