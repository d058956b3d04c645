use std::{
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            AtomicU64,
            Ordering,
        },
    },
    time::Duration,
};

use rand::Rng;
use tokio::{
    sync::mpsc,
    time,
};
use tracing::warn;

use crate::{
    Result,
    api_client::ApiClient,
    snapshot::DiceRoll,
};

/// Attempt budget for one user-triggered roll.
pub const MAX_ATTEMPTS: u32 = 3;
/// Fast responses still animate for this long so the roll never looks abrupt.
pub const MIN_ROLL_DURATION: Duration = Duration::from_secs(1);
/// Success messages clear themselves; failure messages do not.
pub const SUCCESS_MESSAGE_TTL: Duration = Duration::from_secs(3);
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(test)]
mod tests;

/// The one remote action the executor drives. Rolling twice is not
/// idempotent server-side, which is why the executor never retries a call
/// that might have landed concurrently with another.
pub trait DiceGateway {
    fn roll_dice(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> impl Future<Output = Result<DiceRoll>> + Send;
}

impl DiceGateway for ApiClient {
    fn roll_dice(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> impl Future<Output = Result<DiceRoll>> + Send {
        ApiClient::roll_dice(self, game_id, player_id)
    }
}

/// Events surfaced to the UI. `seq` ties messages to one invocation so a
/// stale auto-clear never wipes a newer roll's message.
#[derive(Debug)]
pub enum RollEvent {
    /// A roll was accepted; any prior roll message should be cleared.
    Started { seq: u64 },
    /// Cosmetic placeholder faces while the roll is in flight.
    Face(u8, u8),
    /// Emitted exactly once per successful invocation, never before
    /// [`MIN_ROLL_DURATION`] has elapsed since `Started`.
    Success { seq: u64, roll: DiceRoll },
    /// Emitted [`SUCCESS_MESSAGE_TTL`] after `Success`.
    ClearMessage { seq: u64 },
    /// The attempt budget is exhausted. Persistent; cleared only by rolling
    /// again.
    Failed { seq: u64, message: String },
}

/// Executes dice rolls with bounded retry and a minimum perceived duration.
///
/// The busy flag is a single-flight lock: while one invocation is
/// outstanding, further invocations are no-ops — never queued, never
/// cancelling the in-flight one.
pub struct RollExecutor<G> {
    gateway: Arc<G>,
    busy: Arc<AtomicBool>,
    seq: AtomicU64,
    event_tx: mpsc::UnboundedSender<RollEvent>,
}

impl<G> RollExecutor<G>
where
    G: DiceGateway + Send + Sync + 'static,
{
    pub fn new(gateway: G, event_tx: mpsc::UnboundedSender<RollEvent>) -> Self {
        Self {
            gateway: Arc::new(gateway),
            busy: Arc::new(AtomicBool::new(false)),
            seq: AtomicU64::new(0),
            event_tx,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Returns false (and does nothing at all) while a roll is outstanding.
    pub fn execute(&self, game_id: impl Into<String>, player_id: impl Into<String>) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(run(
            self.gateway.clone(),
            game_id.into(),
            player_id.into(),
            seq,
            self.busy.clone(),
            self.event_tx.clone(),
        ));
        true
    }
}

async fn run<G: DiceGateway>(
    gateway: Arc<G>,
    game_id: String,
    player_id: String,
    seq: u64,
    busy: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<RollEvent>,
) {
    let started = time::Instant::now();
    let _ = tx.send(RollEvent::Started { seq });

    // Placeholder faces keep spinning across retries; only the final
    // settlement stops them.
    let mut frames = time::interval(FRAME_INTERVAL);
    let attempts = attempt_loop(gateway.as_ref(), &game_id, &player_id);
    tokio::pin!(attempts);
    let outcome = loop {
        tokio::select! {
            outcome = &mut attempts => break outcome,
            _ = frames.tick() => {
                let mut rng = rand::rng();
                let _ = tx.send(RollEvent::Face(
                    rng.random_range(1..=6),
                    rng.random_range(1..=6),
                ));
            }
        }
    };

    match outcome {
        Ok(roll) => {
            time::sleep_until(started + MIN_ROLL_DURATION).await;
            let _ = tx.send(RollEvent::Success { seq, roll });
            busy.store(false, Ordering::SeqCst);
            time::sleep(SUCCESS_MESSAGE_TTL).await;
            let _ = tx.send(RollEvent::ClearMessage { seq });
        }
        Err(err) => {
            let message =
                format!("Failed to roll dice after {MAX_ATTEMPTS} attempts. {err}");
            let _ = tx.send(RollEvent::Failed { seq, message });
            busy.store(false, Ordering::SeqCst);
        }
    }
}

async fn attempt_loop<G: DiceGateway>(
    gateway: &G,
    game_id: &str,
    player_id: &str,
) -> Result<DiceRoll> {
    let mut attempt = 1;
    loop {
        match gateway.roll_dice(game_id, player_id).await {
            Ok(roll) => return Ok(roll),
            Err(err) => match after_failure(attempt) {
                AttemptStep::Retry { next_attempt, wait } => {
                    warn!(
                        ?err,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "dice roll failed; retrying"
                    );
                    time::sleep(wait).await;
                    attempt = next_attempt;
                }
                AttemptStep::GiveUp => return Err(err),
            },
        }
    }
}

/// The retry schedule, separate from the I/O that drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptStep {
    Retry { next_attempt: u32, wait: Duration },
    GiveUp,
}

fn after_failure(attempt: u32) -> AttemptStep {
    if attempt >= MAX_ATTEMPTS {
        AttemptStep::GiveUp
    } else {
        AttemptStep::Retry {
            next_attempt: attempt + 1,
            wait: retry_backoff(attempt),
        }
    }
}

/// 500ms, 1000ms, ... doubling per failed attempt (1-based).
fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis(500u64 << (attempt - 1))
}
