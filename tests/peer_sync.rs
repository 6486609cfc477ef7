use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use countdown_sync::{
    services::MemoryStore,
    state::{AppState, IndexPath, TimerConfig, TimerMode},
    sync::{ChannelError, Command, MemoryChannel, SyncDelegate, SyncMessage, SyncPolicy, SyncRole},
    tasks::{peer_inbound_task, peer_outbound_task},
};

fn app_state(role: SyncRole, delegate: Arc<SyncDelegate>) -> Arc<AppState> {
    Arc::new(
        AppState::new(0, "127.0.0.1".into(), role, Arc::new(MemoryStore::new())).with_delegate(delegate),
    )
}

/// Poll `check` until it holds or ten seconds pass
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

fn selected_mode(state: &AppState) -> Option<TimerMode> {
    state
        .get_timer_state()
        .ok()
        .filter(|t| t.timer_id.is_some())
        .map(|t| t.mode)
}

#[tokio::test]
async fn authority_and_replica_stay_in_step() {
    let ((authority_end, authority_inbox), (replica_end, replica_inbox)) = MemoryChannel::pair(16);
    let authority_link = Arc::new(SyncDelegate::new(Arc::new(authority_end), SyncPolicy::default()));
    let replica_link = Arc::new(SyncDelegate::new(Arc::new(replica_end), SyncPolicy::default()));

    let authority = app_state(SyncRole::Authority, Arc::clone(&authority_link));
    let replica = app_state(SyncRole::Replica, Arc::clone(&replica_link));

    let first = authority
        .create_timer(IndexPath::new(0, 0), TimerConfig::new(300, 60, 10))
        .unwrap();
    authority
        .create_timer(IndexPath::new(0, 1), TimerConfig::new(120, 0, 0))
        .unwrap();

    tokio::spawn(peer_inbound_task(Arc::clone(&authority), authority_inbox));
    tokio::spawn(peer_inbound_task(Arc::clone(&replica), replica_inbox));
    tokio::spawn(peer_outbound_task(Arc::clone(&authority), authority_link));
    tokio::spawn(peer_outbound_task(Arc::clone(&replica), replica_link));

    // Replica picks up the authority's model either way round
    assert!(eventually(|| replica.model_counts().ok() == Some((1, 2))).await);
    assert_eq!(replica.get_timer_state().unwrap().timer_id, Some(first));
    // Let the startup push and the context reply both land
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Commands issued on the authority reach the replica
    authority.apply_command(Command::Start, None).unwrap();
    assert!(eventually(|| selected_mode(&replica) == Some(TimerMode::Countdown)).await);

    // A sync pins the replica's remaining time
    let sync = authority
        .sync_message(chrono::Utc::now())
        .unwrap()
        .expect("running timer produces a sync");
    authority.queue_peer(sync);
    assert!(eventually(|| {
        replica
            .get_timer_state()
            .ok()
            .and_then(|t| t.remaining_seconds)
            .is_some_and(|s| (298..=300).contains(&s))
    })
    .await);

    // And the replica can drive the authority
    replica.apply_command(Command::Pause, None).unwrap();
    assert!(eventually(|| selected_mode(&authority) == Some(TimerMode::Paused)).await);

    // Structural changes on the authority are mirrored
    authority.remove_timer(IndexPath::new(0, 1)).unwrap();
    assert!(eventually(|| replica.model_counts().ok() == Some((1, 1))).await);
    assert_eq!(authority.peer_reachable(), Some(true));
    assert_eq!(replica.peer_reachable(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn replica_keeps_running_when_authority_is_gone() {
    let ((_authority_end, authority_inbox), (replica_end, _replica_inbox)) = MemoryChannel::pair(4);
    drop(authority_inbox);
    let replica_link = Arc::new(SyncDelegate::new(Arc::new(replica_end), SyncPolicy::default()));
    let replica = app_state(SyncRole::Replica, Arc::clone(&replica_link));
    let mut link_events = replica_link.subscribe();

    tokio::spawn(peer_outbound_task(Arc::clone(&replica), replica_link));
    assert!(eventually(|| replica.peer_reachable() == Some(false)).await);
    assert!(matches!(
        link_events.recv().await,
        Ok(countdown_sync::sync::LinkEvent::Unreachable { .. })
    ));

    replica
        .create_timer(IndexPath::new(0, 0), TimerConfig::new(30, 0, 0))
        .unwrap();
    let (applied, timer) = replica.apply_command(Command::Start, None).unwrap();
    assert!(applied);
    assert!(timer.is_active());
}

fn sync_to(to: i64) -> SyncMessage {
    SyncMessage::Sync {
        to,
        date: 1_700_000_000.0,
    }
}

fn command(command: Command) -> SyncMessage {
    SyncMessage::NewState {
        command,
        value: None,
    }
}

#[tokio::test(start_paused = true)]
async fn outage_backlog_keeps_commands_and_newest_sync() {
    let ((authority_end, _authority_inbox), (_replica_end, mut replica_inbox)) = MemoryChannel::pair(16);
    let authority_end = Arc::new(authority_end);
    // The initial model push burns its whole retry budget
    for _ in 0..6 {
        authority_end.inject_failure(ChannelError::Unavailable("asleep".into()));
    }
    let link = Arc::new(SyncDelegate::new(authority_end.clone(), SyncPolicy::default()));
    let authority = app_state(SyncRole::Authority, Arc::clone(&link));

    let received = Arc::new(Mutex::new(Vec::new()));
    tokio::spawn({
        let received = Arc::clone(&received);
        async move {
            while let Some(inbound) = replica_inbox.recv().await {
                received.lock().unwrap().push(inbound.message.clone());
                inbound.respond(None);
            }
        }
    });
    tokio::spawn(peer_outbound_task(Arc::clone(&authority), Arc::clone(&link)));
    assert!(eventually(|| authority.peer_reachable() == Some(false)).await);
    assert_eq!(authority_end.attempts(), 6);

    // While the link is down a sync is tried once, not retried
    authority_end.inject_failure(ChannelError::Unavailable("asleep".into()));
    authority.queue_peer(sync_to(90));
    assert!(eventually(|| authority_end.attempts() == 7).await);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(authority_end.attempts(), 7);
    assert_eq!(authority.peer_reachable(), Some(false));

    // A long backlog collapses to its commands and the newest sync
    for to in (30..60).rev() {
        authority.queue_peer(sync_to(to));
        if to == 45 {
            authority.queue_peer(command(Command::Pause));
        }
    }
    authority.queue_peer(command(Command::Resume));
    assert_eq!(authority.outbox.len(), 3);

    assert!(eventually(|| received.lock().unwrap().len() == 3).await);
    assert_eq!(
        *received.lock().unwrap(),
        vec![command(Command::Pause), sync_to(30), command(Command::Resume)]
    );
    assert_eq!(authority.peer_reachable(), Some(true));
}
