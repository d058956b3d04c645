use std::{
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
    time::Duration,
};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::warn;

use crate::{
    RemoteError,
    Result,
    api_client::ApiClient,
    snapshot::{
        GameSnapshot,
        RoomStatus,
    },
};

/// In-game state is polled hard; the lobby can afford to be lazy.
pub const GAME_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const LOBBY_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests;

/// A read operation the poller can drive repeatedly.
pub trait PollSource {
    type Snapshot: ChangeSignal + Clone + Send + 'static;

    fn fetch(&self) -> impl Future<Output = Result<Self::Snapshot>> + Send;
}

/// Decides whether a fresh snapshot is materially different from the retained
/// one. Only the compared fields can trigger downstream propagation.
pub trait ChangeSignal {
    fn differs_from(&self, retained: &Self) -> bool;
}

impl ChangeSignal for GameSnapshot {
    /// Order-sensitive comparison of each player's `position` and `money`.
    /// Other fields (including whose turn it is) never fire the signal on
    /// their own; in practice a turn change always follows a move.
    fn differs_from(&self, retained: &Self) -> bool {
        if self.players.len() != retained.players.len() {
            return true;
        }
        self.players
            .iter()
            .zip(&retained.players)
            .any(|(fresh, old)| fresh.position != old.position || fresh.money != old.money)
    }
}

impl ChangeSignal for RoomStatus {
    fn differs_from(&self, retained: &Self) -> bool {
        self.room_id != retained.room_id
            || self.room_code != retained.room_code
            || self.players != retained.players
    }
}

/// Polls `GET /api/game/state`.
pub struct GameStateSource(pub ApiClient);

impl PollSource for GameStateSource {
    type Snapshot = GameSnapshot;

    fn fetch(&self) -> impl Future<Output = Result<GameSnapshot>> + Send {
        self.0.game_snapshot()
    }
}

/// Polls `GET /api/room/status`.
pub struct RoomStatusSource(pub ApiClient);

impl PollSource for RoomStatusSource {
    type Snapshot = RoomStatus;

    fn fetch(&self) -> impl Future<Output = Result<RoomStatus>> + Send {
        self.0.room_status()
    }
}

/// Result of one Idle -> Fetching -> Idle cycle.
#[derive(Debug)]
pub enum PollOutcome<S> {
    /// The change signal fired (or nothing was retained yet); the retained
    /// snapshot was replaced wholesale with this one.
    Applied(S),
    /// Fetch succeeded but nothing material changed; the result was dropped.
    Unchanged,
    /// Fetch failed and no fetch has ever succeeded. User-visible.
    Failed(RemoteError),
    /// Fetch failed after a prior success. Stale-but-displayed beats flicker;
    /// the retained snapshot stays and the next tick retries.
    Ignored(RemoteError),
}

/// The reconciliation state machine, independent of any timer.
///
/// Owns the last applied snapshot exclusively; nothing else writes it.
pub struct ChangePoller<S: PollSource> {
    source: S,
    retained: Option<S::Snapshot>,
    ever_succeeded: bool,
}

impl<S: PollSource> ChangePoller<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            retained: None,
            ever_succeeded: false,
        }
    }

    pub fn retained(&self) -> Option<&S::Snapshot> {
        self.retained.as_ref()
    }

    pub fn ever_succeeded(&self) -> bool {
        self.ever_succeeded
    }

    pub async fn poll_once(&mut self) -> PollOutcome<S::Snapshot> {
        match self.source.fetch().await {
            Ok(fresh) => {
                self.ever_succeeded = true;
                let changed = self
                    .retained
                    .as_ref()
                    .is_none_or(|retained| fresh.differs_from(retained));
                if changed {
                    self.retained = Some(fresh.clone());
                    PollOutcome::Applied(fresh)
                } else {
                    PollOutcome::Unchanged
                }
            }
            Err(err) if self.ever_succeeded => PollOutcome::Ignored(err),
            Err(err) => PollOutcome::Failed(err),
        }
    }
}

/// What the worker forwards downstream. `Unchanged` never crosses the
/// channel, so consumers re-render only on material change.
#[derive(Debug)]
pub enum PollUpdate<S> {
    Snapshot(S),
    /// Only emitted while nothing has ever been applied; the screen shows a
    /// retryable error instead of stale data it does not have.
    FirstLoadFailed(RemoteError),
}

enum PollCommand {
    FetchNow,
    Shutdown,
}

/// Handle to a running poll worker. Teardown is explicit via
/// [`PollerHandle::stop`]; merely dropping the handle also winds the worker
/// down (the command channel closes), but without the liveness guarantee
/// that late fetch results are dropped.
pub struct PollerHandle {
    alive: Arc<AtomicBool>,
    cmd_tx: mpsc::UnboundedSender<PollCommand>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Fetch now instead of waiting for the next tick (screen entry, manual
    /// retry).
    pub fn kick(&self) {
        let _ = self.cmd_tx.send(PollCommand::FetchNow);
    }

    /// Deterministic teardown: the timer dies, an in-flight round trip is not
    /// cancelled, but any outcome settling after this call is dropped before
    /// it reaches the update channel.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let _ = self.cmd_tx.send(PollCommand::Shutdown);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Await worker termination after `stop()`.
    pub async fn stopped(self) {
        let _ = self.task.await;
    }
}

/// Start the fixed-interval worker for one screen. The interval never adapts
/// and never backs off; poll failures are expected to be transient.
pub fn spawn_poller<S>(
    source: S,
    interval: Duration,
    update_tx: mpsc::UnboundedSender<PollUpdate<S::Snapshot>>,
) -> PollerHandle
where
    S: PollSource + Send + 'static,
{
    let alive = Arc::new(AtomicBool::new(true));
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(poll_worker(
        ChangePoller::new(source),
        interval,
        alive.clone(),
        cmd_rx,
        update_tx,
    ));
    PollerHandle {
        alive,
        cmd_tx,
        task,
    }
}

async fn poll_worker<S>(
    mut poller: ChangePoller<S>,
    interval: Duration,
    alive: Arc<AtomicBool>,
    mut cmd_rx: mpsc::UnboundedReceiver<PollCommand>,
    update_tx: mpsc::UnboundedSender<PollUpdate<S::Snapshot>>,
) where
    S: PollSource,
{
    // Fetches are strictly sequential within one worker: each round trip is
    // awaited before the next tick is serviced, so a slow response can never
    // overwrite a newer one.
    let mut ticker = time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !drive(&mut poller, &alive, &update_tx).await {
                    break;
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PollCommand::FetchNow) => {
                        if !drive(&mut poller, &alive, &update_tx).await {
                            break;
                        }
                    }
                    Some(PollCommand::Shutdown) | None => break,
                }
            }
        }
    }
}

/// Returns false when the worker should terminate.
async fn drive<S>(
    poller: &mut ChangePoller<S>,
    alive: &AtomicBool,
    update_tx: &mpsc::UnboundedSender<PollUpdate<S::Snapshot>>,
) -> bool
where
    S: PollSource,
{
    let outcome = poller.poll_once().await;
    if !alive.load(Ordering::SeqCst) {
        return false;
    }
    match outcome {
        PollOutcome::Applied(snapshot) => update_tx.send(PollUpdate::Snapshot(snapshot)).is_ok(),
        PollOutcome::Unchanged => true,
        PollOutcome::Failed(err) => update_tx.send(PollUpdate::FirstLoadFailed(err)).is_ok(),
        PollOutcome::Ignored(err) => {
            warn!(?err, "poll failed after first load; keeping retained snapshot");
            true
        }
    }
}
