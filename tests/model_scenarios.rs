use chrono::{Duration, TimeZone, Utc};
use countdown_sync::state::{IndexPath, TimerConfig, TimerEvent, TimerMode, TimerModel};

fn five_seconds() -> TimerConfig {
    TimerConfig::new(5, 0, 0)
}

#[test]
fn second_timer_stays_selected_when_first_is_removed() {
    let mut model = TimerModel::new();
    let first = model.create_new_timer(IndexPath::new(0, 0), five_seconds());

    assert!(model.can_insert_timer(IndexPath::new(0, 1), None));
    let second = model.create_new_timer(IndexPath::new(0, 1), five_seconds());
    assert_eq!(model.count(), 1);
    assert_eq!(model.group(0).map(|g| g.len()), Some(2));

    assert!(model.set_selected(second, true));
    let removed = model.remove_timer(IndexPath::new(0, 0));
    assert_eq!(removed.id(), first);

    let group = model.group(0).unwrap();
    assert_eq!(group.len(), 1);
    assert_eq!(group.timers()[0].id(), second);
    assert!(model.is_selected(second));
}

#[test]
fn removing_the_selected_timer_reassigns_selection() {
    let mut model = TimerModel::new();
    let first = model.create_new_timer(IndexPath::new(0, 0), five_seconds());
    let second = model.create_new_timer(IndexPath::new(0, 1), five_seconds());

    model.set_selected(first, true);
    model.remove_timer(IndexPath::new(0, 0));
    assert!(model.is_selected(second));
    assert_eq!(model.selected_timer().map(|t| t.id()), Some(second));
}

#[test]
fn sequence_runs_through_a_group_and_survives_persistence() {
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap();
    let mut model = TimerModel::new();
    let warm_up = model.create_new_timer(IndexPath::new(0, 0), TimerConfig::new(3, 0, 0));
    let main = model.create_new_timer(IndexPath::new(0, 1), TimerConfig::new(10, 5, 2));
    model.group_mut(0).unwrap().transition_sound_filename = Some("chime.caf".into());
    model.set_selected(warm_up, true);
    model.timer_mut(warm_up).unwrap().start(t0);
    model.drain_events();

    let events = model.advance(t0 + Duration::seconds(3));
    assert!(events.iter().any(|e| matches!(
        e,
        TimerEvent::SequenceAdvanced { from, to, transition_sound: Some(sound), .. }
            if *from == warm_up && *to == main && sound == "chime.caf"
    )));
    assert!(model.is_selected(main));
    assert_eq!(model.timer(main).unwrap().mode(), TimerMode::Countdown);

    model.advance(t0 + Duration::seconds(9));
    assert_eq!(model.timer(main).unwrap().current_time(), 4);
    assert_eq!(model.timer(main).unwrap().mode(), TimerMode::Warning);

    let restored = TimerModel::from_persisted(&model.to_persisted());
    assert_eq!(restored.count(), 1);
    assert!(restored.is_selected(main));
    let engine = restored.timer(main).unwrap().engine();
    assert_eq!(engine.current_time(), 4);
    assert_eq!(engine.mode(), TimerMode::Warning);
    assert_eq!(
        restored.group(0).unwrap().transition_sound_filename.as_deref(),
        Some("chime.caf")
    );
}

#[test]
fn moves_keep_total_count_and_group_links() {
    let mut model = TimerModel::new();
    let a = model.create_new_timer(IndexPath::new(0, 0), five_seconds());
    model.create_new_timer(IndexPath::new(1, 0), five_seconds());
    model.create_new_timer(IndexPath::new(1, 1), five_seconds());

    model.move_timer(IndexPath::new(0, 0), IndexPath::new(1, 2));
    assert_eq!(model.count(), 1);
    assert_eq!(model.timer_count(), 3);
    let group = model.group(0).unwrap();
    assert_eq!(model.timer(a).unwrap().group(), group.id());
    assert_eq!(model.index_path_of(a), Some(IndexPath::new(0, 2)));
}
