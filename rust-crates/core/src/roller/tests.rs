#![allow(non_snake_case)]

use std::{
    collections::VecDeque,
    sync::Mutex,
};

use chrono::Utc;

use super::*;
use crate::RemoteError;

struct FakeGateway {
    script: Mutex<VecDeque<Result<DiceRoll>>>,
    calls: Mutex<Vec<time::Instant>>,
    latency: Duration,
}

impl FakeGateway {
    fn new(script: Vec<Result<DiceRoll>>, latency: Duration) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            latency,
        }
    }

    fn call_times(&self) -> Vec<time::Instant> {
        self.calls.lock().unwrap().clone()
    }
}

impl DiceGateway for &'static FakeGateway {
    fn roll_dice(
        &self,
        _game_id: &str,
        _player_id: &str,
    ) -> impl Future<Output = Result<DiceRoll>> + Send {
        self.calls.lock().unwrap().push(time::Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        let latency = self.latency;
        async move {
            time::sleep(latency).await;
            next.unwrap_or_else(|| Err(RemoteError::payload("test", "script exhausted")))
        }
    }
}

fn leak(gateway: FakeGateway) -> &'static FakeGateway {
    Box::leak(Box::new(gateway))
}

fn roll(d1: u8, d2: u8) -> DiceRoll {
    DiceRoll {
        dice: [d1, d2],
        total: d1 + d2,
        double: d1 == d2,
        timestamp: Utc::now(),
    }
}

fn remote_error() -> RemoteError {
    RemoteError::payload("test", "boom")
}

/// Drain events until the predicate matches, returning everything seen.
async fn drain_until(
    rx: &mut mpsc::UnboundedReceiver<RollEvent>,
    mut done: impl FnMut(&RollEvent) -> bool,
) -> Vec<RollEvent> {
    let mut seen = Vec::new();
    loop {
        let event = rx.recv().await.expect("event channel closed early");
        let stop = done(&event);
        seen.push(event);
        if stop {
            return seen;
        }
    }
}

fn count_successes(events: &[RollEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, RollEvent::Success { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn execute__always_failing__attempts_exactly_three_times_with_backoff() {
    // given
    let gateway = leak(FakeGateway::new(
        vec![Err(remote_error()), Err(remote_error()), Err(remote_error())],
        Duration::ZERO,
    ));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let executor = RollExecutor::new(gateway, tx);

    // when
    assert!(executor.execute("game-1", "A"));
    let events = drain_until(&mut rx, |e| matches!(e, RollEvent::Failed { .. })).await;

    // then: three calls, 500ms then 1000ms apart, and no success callback
    let calls = gateway.call_times();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1] - calls[0], Duration::from_millis(500));
    assert_eq!(calls[2] - calls[1], Duration::from_millis(1000));
    assert_eq!(count_successes(&events), 0);
    assert!(!executor.is_busy());
}

#[tokio::test(start_paused = true)]
async fn execute__failed_message__is_persistent() {
    // given
    let gateway = leak(FakeGateway::new(
        vec![Err(remote_error()), Err(remote_error()), Err(remote_error())],
        Duration::ZERO,
    ));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let executor = RollExecutor::new(gateway, tx);

    // when
    executor.execute("game-1", "A");
    drain_until(&mut rx, |e| matches!(e, RollEvent::Failed { .. })).await;
    time::sleep(Duration::from_secs(10)).await;

    // then: no auto-clear ever arrives
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn execute__fast_success__waits_for_the_minimum_duration() {
    // given: the server answers in 10ms
    let gateway = leak(FakeGateway::new(
        vec![Ok(roll(2, 5))],
        Duration::from_millis(10),
    ));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let executor = RollExecutor::new(gateway, tx);
    let started = time::Instant::now();

    // when
    executor.execute("game-1", "A");
    drain_until(&mut rx, |e| matches!(e, RollEvent::Success { .. })).await;

    // then: completion was held back to the 1s animation floor
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn execute__success__emits_result_once_then_auto_clears() {
    // given
    let gateway = leak(FakeGateway::new(vec![Ok(roll(4, 3))], Duration::ZERO));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let executor = RollExecutor::new(gateway, tx);

    // when
    executor.execute("game-1", "A");
    let events =
        drain_until(&mut rx, |e| matches!(e, RollEvent::ClearMessage { .. })).await;

    // then
    assert_eq!(count_successes(&events), 1);
    let (success_seq, reported) = events
        .iter()
        .find_map(|e| match e {
            RollEvent::Success { seq, roll } => Some((*seq, roll.clone())),
            _ => None,
        })
        .expect("success event");
    assert_eq!(reported.total, 7);
    assert_eq!(reported.dice, [4, 3]);
    let Some(RollEvent::ClearMessage { seq }) = events.last() else {
        panic!("expected trailing auto-clear");
    };
    assert_eq!(*seq, success_seq);
}

#[tokio::test(start_paused = true)]
async fn execute__while_busy__is_a_no_op() {
    // given: a roll that stays in flight for a while
    let gateway = leak(FakeGateway::new(
        vec![Ok(roll(1, 2))],
        Duration::from_millis(200),
    ));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let executor = RollExecutor::new(gateway, tx);

    // when: three rapid invocations
    assert!(executor.execute("game-1", "A"));
    assert!(!executor.execute("game-1", "A"));
    assert!(!executor.execute("game-1", "A"));
    let events = drain_until(&mut rx, |e| matches!(e, RollEvent::Success { .. })).await;

    // then: exactly one gateway call and one roll lifecycle
    assert_eq!(gateway.call_times().len(), 1);
    let starts = events
        .iter()
        .filter(|e| matches!(e, RollEvent::Started { .. }))
        .count();
    assert_eq!(starts, 1);
    assert_eq!(count_successes(&events), 1);
}

#[tokio::test(start_paused = true)]
async fn execute__retry_after_failure__succeeds_on_second_attempt() {
    // given
    let gateway = leak(FakeGateway::new(
        vec![Err(remote_error()), Ok(roll(6, 6))],
        Duration::ZERO,
    ));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let executor = RollExecutor::new(gateway, tx);

    // when
    executor.execute("game-1", "A");
    let events = drain_until(&mut rx, |e| matches!(e, RollEvent::Success { .. })).await;

    // then
    assert_eq!(gateway.call_times().len(), 2);
    assert_eq!(count_successes(&events), 1);
    let doubles = events.iter().any(|e| {
        matches!(e, RollEvent::Success { roll, .. } if roll.double && roll.total == 12)
    });
    assert!(doubles);
}

#[test]
fn after_failure__follows_the_retry_schedule() {
    assert_eq!(
        after_failure(1),
        AttemptStep::Retry {
            next_attempt: 2,
            wait: Duration::from_millis(500),
        }
    );
    assert_eq!(
        after_failure(2),
        AttemptStep::Retry {
            next_attempt: 3,
            wait: Duration::from_millis(1000),
        }
    );
    assert_eq!(after_failure(3), AttemptStep::GiveUp);
}
