#![allow(non_snake_case)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
    },
};

use proptest::{
    prelude::*,
    sample::Index,
};

use super::*;
use crate::{
    snapshot::Player,
    turn::TurnTracker,
};

struct ScriptedSource<S> {
    responses: Arc<Mutex<VecDeque<Result<S>>>>,
}

impl<S> ScriptedSource<S> {
    fn new(responses: Vec<Result<S>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().collect())),
        }
    }
}

impl<S: ChangeSignal + Clone + Send + 'static> PollSource for ScriptedSource<S> {
    type Snapshot = S;

    fn fetch(&self) -> impl Future<Output = Result<S>> + Send {
        let next = self.responses.lock().unwrap().pop_front();
        async move {
            match next {
                Some(response) => response,
                None => Err(RemoteError::payload("test", "script exhausted")),
            }
        }
    }
}

fn player(id: &str, seat: u32, position: u8, money: i64) -> Player {
    Player {
        id: id.to_string(),
        seat_order: seat,
        position,
        money,
        properties: Vec::new(),
        utilities: Vec::new(),
        transports: Vec::new(),
    }
}

fn game(players: Vec<Player>, turn: usize, you: &str) -> GameSnapshot {
    GameSnapshot {
        players,
        current_turn_index: turn,
        you: you.to_string(),
    }
}

fn room(code: &str, players: &[&str]) -> RoomStatus {
    RoomStatus {
        room_id: "room-1".to_string(),
        room_code: code.to_string(),
        players: players.iter().map(|p| p.to_string()).collect(),
        max_players: 4,
        room_state: crate::snapshot::RoomState::Waiting,
        user: players.first().unwrap_or(&"nobody").to_string(),
    }
}

fn remote_error() -> RemoteError {
    RemoteError::payload("test", "boom")
}

#[tokio::test]
async fn poll_once__first_fetch__applies_snapshot() {
    // given
    let first = game(vec![player("A", 1, 1, 1500)], 0, "A");
    let mut poller = ChangePoller::new(ScriptedSource::new(vec![Ok(first.clone())]));

    // when
    let outcome = poller.poll_once().await;

    // then
    assert!(matches!(outcome, PollOutcome::Applied(s) if s == first));
    assert_eq!(poller.retained(), Some(&first));
    assert!(poller.ever_succeeded());
}

#[tokio::test]
async fn poll_once__identical_positions_and_money__suppresses_propagation() {
    // given: second fetch differs only in whose turn it is
    let first = game(
        vec![player("A", 1, 5, 1500), player("B", 2, 9, 1200)],
        0,
        "A",
    );
    let second = game(
        vec![player("A", 1, 5, 1500), player("B", 2, 9, 1200)],
        1,
        "A",
    );
    let mut poller =
        ChangePoller::new(ScriptedSource::new(vec![Ok(first.clone()), Ok(second)]));

    // when
    poller.poll_once().await;
    let outcome = poller.poll_once().await;

    // then: discarded silently, retained snapshot untouched
    assert!(matches!(outcome, PollOutcome::Unchanged));
    assert_eq!(poller.retained(), Some(&first));
}

#[tokio::test]
async fn poll_once__single_position_change__propagates() {
    // given
    let first = game(
        vec![player("A", 1, 5, 1500), player("B", 2, 9, 1200)],
        0,
        "A",
    );
    let second = game(
        vec![player("A", 1, 12, 1500), player("B", 2, 9, 1200)],
        0,
        "A",
    );
    let mut poller = ChangePoller::new(ScriptedSource::new(vec![
        Ok(first),
        Ok(second.clone()),
    ]));

    // when
    poller.poll_once().await;
    let outcome = poller.poll_once().await;

    // then
    assert!(matches!(outcome, PollOutcome::Applied(s) if s == second));
    assert_eq!(poller.retained(), Some(&second));
}

#[tokio::test]
async fn poll_once__player_count_change__propagates() {
    // given
    let first = game(vec![player("A", 1, 1, 1500)], 0, "A");
    let second = game(
        vec![player("A", 1, 1, 1500), player("B", 2, 1, 1500)],
        0,
        "A",
    );
    let mut poller = ChangePoller::new(ScriptedSource::new(vec![
        Ok(first),
        Ok(second.clone()),
    ]));

    // when
    poller.poll_once().await;
    let outcome = poller.poll_once().await;

    // then
    assert!(matches!(outcome, PollOutcome::Applied(s) if s == second));
}

#[tokio::test]
async fn poll_once__failure_before_first_success__is_user_visible() {
    // given
    let mut poller: ChangePoller<ScriptedSource<GameSnapshot>> =
        ChangePoller::new(ScriptedSource::new(vec![Err(remote_error())]));

    // when
    let outcome = poller.poll_once().await;

    // then
    assert!(matches!(outcome, PollOutcome::Failed(_)));
    assert!(poller.retained().is_none());
    assert!(!poller.ever_succeeded());
}

#[tokio::test]
async fn poll_once__failure_after_success__is_ignored_and_keeps_snapshot() {
    // given
    let first = game(vec![player("A", 1, 7, 900)], 0, "A");
    let mut poller = ChangePoller::new(ScriptedSource::new(vec![
        Ok(first.clone()),
        Err(remote_error()),
    ]));

    // when
    poller.poll_once().await;
    let outcome = poller.poll_once().await;

    // then: swallowed, stale snapshot still displayed
    assert!(matches!(outcome, PollOutcome::Ignored(_)));
    assert_eq!(poller.retained(), Some(&first));
}

#[tokio::test]
async fn poll_once__room_identity_fields_drive_change_signal() {
    // given
    let unchanged = room("KJ92", &["ana", "bo"]);
    let new_joiner = room("KJ92", &["ana", "bo", "cy"]);
    let mut poller = ChangePoller::new(ScriptedSource::new(vec![
        Ok(unchanged.clone()),
        Ok(unchanged.clone()),
        Ok(new_joiner.clone()),
    ]));

    // when / then
    assert!(matches!(poller.poll_once().await, PollOutcome::Applied(_)));
    assert!(matches!(poller.poll_once().await, PollOutcome::Unchanged));
    assert!(matches!(
        poller.poll_once().await,
        PollOutcome::Applied(s) if s == new_joiner
    ));
}

#[tokio::test]
async fn poll_once__wraparound_move__propagates_and_flips_turn() {
    // given: A rolls from 38 past cell 40 and the turn passes to B
    let before = game(
        vec![player("A", 1, 38, 1500), player("B", 2, 1, 1500)],
        0,
        "A",
    );
    let after = game(
        vec![player("A", 1, 3, 1500), player("B", 2, 1, 1500)],
        1,
        "A",
    );
    let mut poller = ChangePoller::new(ScriptedSource::new(vec![
        Ok(before),
        Ok(after.clone()),
    ]));
    let mut turns = TurnTracker::default();

    // when
    let first = poller.poll_once().await;
    let PollOutcome::Applied(first_snapshot) = first else {
        panic!("first fetch must apply");
    };
    let before_view = turns.observe(&first_snapshot);
    let second = poller.poll_once().await;

    // then
    let PollOutcome::Applied(second_snapshot) = second else {
        panic!("wrapped move must propagate");
    };
    let after_view = turns.observe(&second_snapshot);
    assert_eq!(second_snapshot, after);
    assert!(before_view.is_your_turn);
    assert!(!after_view.is_your_turn);
}

#[tokio::test(start_paused = true)]
async fn spawn_poller__stop__terminates_worker() {
    // given
    let snapshot = game(vec![player("A", 1, 1, 1500)], 0, "A");
    let source = ScriptedSource::new(vec![Ok(snapshot.clone())]);
    let (tx, mut rx) = mpsc::unbounded_channel();

    // when
    let handle = spawn_poller(source, Duration::from_secs(1), tx);
    let first = rx.recv().await;
    handle.stop();

    // then
    assert!(matches!(first, Some(PollUpdate::Snapshot(s)) if s == snapshot));
    assert!(!handle.is_alive());
    handle.stopped().await;
}

#[tokio::test(start_paused = true)]
async fn spawn_poller__first_load_failure__is_forwarded() {
    // given
    let source: ScriptedSource<GameSnapshot> =
        ScriptedSource::new(vec![Err(remote_error())]);
    let (tx, mut rx) = mpsc::unbounded_channel();

    // when
    let handle = spawn_poller(source, Duration::from_secs(1), tx);
    let first = rx.recv().await;

    // then
    assert!(matches!(first, Some(PollUpdate::FirstLoadFailed(_))));
    handle.stop();
    handle.stopped().await;
}

proptest! {
    #[test]
    fn change_signal__snapshot_never_differs_from_itself(
        seats in proptest::collection::vec((1u8..=40, 0i64..10_000), 1..6)
    ) {
        let players: Vec<Player> = seats
            .iter()
            .enumerate()
            .map(|(i, (position, money))| {
                player(&format!("p{i}"), i as u32 + 1, *position, *money)
            })
            .collect();
        let snapshot = game(players, 0, "p0");
        prop_assert!(!snapshot.differs_from(&snapshot));
    }

    #[test]
    fn change_signal__moving_any_single_player_differs(
        seats in proptest::collection::vec((1u8..=40, 0i64..10_000), 1..6),
        mover in any::<Index>(),
    ) {
        let players: Vec<Player> = seats
            .iter()
            .enumerate()
            .map(|(i, (position, money))| {
                player(&format!("p{i}"), i as u32 + 1, *position, *money)
            })
            .collect();
        let before = game(players, 0, "p0");
        let mut after = before.clone();
        let idx = mover.index(after.players.len());
        let moved = &mut after.players[idx];
        moved.position = moved.position % 40 + 1;
        prop_assert!(after.differs_from(&before));
    }
}
