use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use tokio::sync::mpsc;
use tracing::{
    info,
    warn,
};

use crate::ui;
use touchline_core::{
    api_client::ApiClient,
    poller::{
        GAME_POLL_INTERVAL,
        GameStateSource,
        LOBBY_POLL_INTERVAL,
        PollUpdate,
        PollerHandle,
        RoomStatusSource,
        spawn_poller,
    },
    roller::{
        RollEvent,
        RollExecutor,
    },
    snapshot::{
        BoardConfig,
        GameSnapshot,
        RoomStatus,
    },
    turn::{
        TurnTracker,
        TurnView,
    },
    view::{
        TableView,
        project,
    },
};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
pub const DEFAULT_BOARD_ID: &str = "classic";
pub const DEFAULT_BOARD_VERSION: &str = "v1";

#[derive(Clone, Debug)]
pub enum RoomEntry {
    Create,
    Join { code: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_url: String,
    pub entry: RoomEntry,
    pub board_id: String,
    pub board_version: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Lobby,
    Game,
}

/// Everything one frame needs. Built fresh per draw from controller state.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub screen: Screen,
    pub status: String,
    pub load_error: Option<String>,
    pub room: Option<RoomStatus>,
    pub board: Option<BoardConfig>,
    pub table: Option<TableView>,
    pub turn: Option<TurnView>,
    pub you: Option<String>,
    pub dice: (u8, u8),
    pub rolling: bool,
    pub roll_message: Option<String>,
    pub roll_error: Option<String>,
    pub rolled_at: Option<String>,
}

pub struct AppController {
    api: ApiClient,
    board_id: String,
    board_version: String,
    screen: Screen,
    room: Option<RoomStatus>,
    board: Option<BoardConfig>,
    game: Option<GameSnapshot>,
    table: Option<TableView>,
    turn: TurnTracker,
    turn_view: Option<TurnView>,
    dice: (u8, u8),
    rolling: bool,
    roll_message: Option<String>,
    roll_error: Option<String>,
    roll_seq: u64,
    last_roll_at: Option<DateTime<Utc>>,
    status: String,
    load_error: Option<String>,
}

impl AppController {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let AppConfig {
            server_url,
            entry,
            board_id,
            board_version,
        } = config;
        let api = ApiClient::new(&server_url)
            .wrap_err_with(|| format!("failed to build API client for {server_url}"))?;

        let status = match entry {
            RoomEntry::Create => {
                let code = api
                    .create_room()
                    .await
                    .wrap_err("failed to create a room")?;
                info!(code, "room created");
                format!("Room created. Share code {code} with the other players")
            }
            RoomEntry::Join { code } => {
                api.join_room(&code)
                    .await
                    .wrap_err_with(|| format!("failed to join room {code}"))?;
                info!(code, "room joined");
                format!("Joined room {code}")
            }
        };

        Ok(Self {
            api,
            board_id,
            board_version,
            screen: Screen::Lobby,
            room: None,
            board: None,
            game: None,
            table: None,
            turn: TurnTracker::default(),
            turn_view: None,
            dice: (1, 1),
            rolling: false,
            roll_message: None,
            roll_error: None,
            roll_seq: 0,
            last_roll_at: None,
            status,
            load_error: None,
        })
    }

    pub fn build_snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            screen: self.screen,
            status: self.status.clone(),
            load_error: self.load_error.clone(),
            room: self.room.clone(),
            board: self.board.clone(),
            table: self.table.clone(),
            turn: self.turn_view.clone(),
            you: self.game.as_ref().map(|g| g.you.clone()),
            dice: self.dice,
            rolling: self.rolling,
            roll_message: self.roll_message.clone(),
            roll_error: self.roll_error.clone(),
            rolled_at: self
                .last_roll_at
                .map(|at| at.format("%H:%M:%S").to_string()),
        }
    }

    fn is_host(&self) -> bool {
        self.room.as_ref().is_some_and(RoomStatus::is_host)
    }

    fn apply_room_update(&mut self, update: PollUpdate<RoomStatus>) {
        match update {
            PollUpdate::Snapshot(room) => {
                self.load_error = None;
                self.status = if room.is_host() {
                    "You are hosting. Press 's' to start once everyone is in".to_string()
                } else {
                    "Waiting for the host to start the room. Press 'g' once the match begins"
                        .to_string()
                };
                self.room = Some(room);
            }
            PollUpdate::FirstLoadFailed(err) => {
                self.load_error = Some(format!("Failed to fetch room status. {err}"));
            }
        }
    }

    fn apply_game_update(&mut self, update: PollUpdate<GameSnapshot>) {
        match update {
            PollUpdate::Snapshot(snapshot) => {
                self.load_error = None;
                let view = self.turn.observe(&snapshot);
                self.table = Some(project(&snapshot));
                self.status = if view.is_your_turn {
                    "Your turn. Press 'r' to roll".to_string()
                } else if let Some(active) = &view.active {
                    format!("Waiting for {}", active.id)
                } else {
                    "Waiting for the next turn".to_string()
                };
                self.turn_view = Some(view);
                self.game = Some(snapshot);
            }
            PollUpdate::FirstLoadFailed(err) => {
                self.load_error = Some(format!("Failed to fetch match state. {err}"));
            }
        }
    }

    fn apply_roll_event(&mut self, event: RollEvent) {
        match event {
            RollEvent::Started { seq } => {
                self.rolling = true;
                self.roll_message = None;
                self.roll_error = None;
                self.roll_seq = seq;
            }
            RollEvent::Face(a, b) => {
                self.dice = (a, b);
            }
            RollEvent::Success { seq, roll } => {
                self.rolling = false;
                self.dice = (roll.dice[0], roll.dice[1]);
                let double_note = if roll.double { " A double!" } else { "" };
                self.roll_message = Some(format!(
                    "Rolled {} and {} = {}!{}",
                    roll.dice[0], roll.dice[1], roll.total, double_note
                ));
                self.roll_seq = seq;
                self.last_roll_at = Some(roll.timestamp);
                info!(total = roll.total, double = roll.double, "roll confirmed");
            }
            RollEvent::ClearMessage { seq } => {
                if seq == self.roll_seq {
                    self.roll_message = None;
                }
            }
            RollEvent::Failed { seq: _, message } => {
                self.rolling = false;
                self.roll_error = Some(message);
            }
        }
    }

    /// The identifiers the roll endpoint wants. Unavailable until the first
    /// game snapshot has landed.
    fn roll_ids(&self) -> Option<(String, String)> {
        let game = self.game.as_ref()?;
        let game_id = self
            .room
            .as_ref()
            .map(|room| room.room_id.clone())
            .unwrap_or_else(|| "game-1".to_string());
        Some((game_id, game.you.clone()))
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let mut controller = AppController::new(config).await?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(&mut controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEvents,
) -> Result<()> {
    let (room_tx, mut room_rx) = mpsc::unbounded_channel();
    let (game_tx, mut game_rx) = mpsc::unbounded_channel();
    let (roll_tx, mut roll_rx) = mpsc::unbounded_channel();

    let mut room_poller = Some(spawn_poller(
        RoomStatusSource(controller.api.clone()),
        LOBBY_POLL_INTERVAL,
        room_tx.clone(),
    ));
    let mut game_poller: Option<PollerHandle> = None;
    let roller = RollExecutor::new(controller.api.clone(), roll_tx);

    ui::draw(ui_state, &controller.build_snapshot())?;

    let result = loop {
        tokio::select! {
            update = room_rx.recv() => {
                let Some(update) = update else { break Ok(()); };
                controller.apply_room_update(update);
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw after room update failed")?;
            }
            update = game_rx.recv() => {
                let Some(update) = update else { break Ok(()); };
                controller.apply_game_update(update);
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw after match update failed")?;
            }
            event = roll_rx.recv() => {
                let Some(event) = event else { break Ok(()); };
                controller.apply_roll_event(event);
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw after roll event failed")?;
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
            raw = ui::next_raw_event(input_events) => {
                let event = raw?;
                let Some(ev) = ui::interpret_event(event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break Ok(()),
                    ui::UserEvent::Redraw => {
                        ui::draw(ui_state, &controller.build_snapshot())
                            .wrap_err("redraw failed")?;
                    }
                    ui::UserEvent::StartRoom => {
                        if controller.screen == Screen::Lobby && controller.is_host() {
                            match controller.api.start_room().await {
                                Ok(()) => {
                                    enter_game(
                                        controller,
                                        &mut room_poller,
                                        &mut game_poller,
                                        &game_tx,
                                    )
                                    .await;
                                }
                                Err(err) => {
                                    warn!(?err, "start room failed");
                                    controller.status =
                                        format!("Could not start the room: {err}");
                                }
                            }
                            ui::draw(ui_state, &controller.build_snapshot())
                                .wrap_err("draw after start failed")?;
                        }
                    }
                    ui::UserEvent::EnterGame => {
                        if controller.screen == Screen::Lobby && controller.room.is_some() {
                            enter_game(
                                controller,
                                &mut room_poller,
                                &mut game_poller,
                                &game_tx,
                            )
                            .await;
                            ui::draw(ui_state, &controller.build_snapshot())
                                .wrap_err("draw after entering match failed")?;
                        }
                    }
                    ui::UserEvent::Roll => {
                        if controller.load_error.is_some() {
                            // retry the failed first load instead of rolling
                            controller.load_error = None;
                            let active_poller = match controller.screen {
                                Screen::Lobby => room_poller.as_ref(),
                                Screen::Game => game_poller.as_ref(),
                            };
                            if let Some(poller) = active_poller {
                                poller.kick();
                            }
                            ui::draw(ui_state, &controller.build_snapshot())
                                .wrap_err("draw after retry failed")?;
                        } else if controller.screen == Screen::Game {
                            let your_turn = controller
                                .turn_view
                                .as_ref()
                                .is_some_and(|t| t.is_your_turn);
                            if !your_turn {
                                controller.status =
                                    "Wait for your turn before rolling".to_string();
                                ui::draw(ui_state, &controller.build_snapshot())
                                    .wrap_err("draw after refused roll failed")?;
                            } else if let Some((game_id, player_id)) = controller.roll_ids() {
                                // busy invocations are silent no-ops
                                roller.execute(game_id, player_id);
                            }
                        }
                    }
                }
            }
        }
    };

    if let Some(poller) = room_poller.take() {
        poller.stop();
    }
    if let Some(poller) = game_poller.take() {
        poller.stop();
    }
    result
}

/// Lobby teardown plus game screen bring-up. The lobby poller is stopped
/// unconditionally; a status fetch still in flight settles into nothing.
async fn enter_game(
    controller: &mut AppController,
    room_poller: &mut Option<PollerHandle>,
    game_poller: &mut Option<PollerHandle>,
    game_tx: &mpsc::UnboundedSender<PollUpdate<GameSnapshot>>,
) {
    if let Some(poller) = room_poller.take() {
        poller.stop();
    }
    if controller.board.is_none() {
        match controller
            .api
            .board_config(&controller.board_id, &controller.board_version)
            .await
        {
            Ok(config) => controller.board = Some(config),
            Err(err) => {
                // the match is playable without theme data; cell names fall back
                warn!(?err, "board config fetch failed");
            }
        }
    }
    controller.screen = Screen::Game;
    controller.load_error = None;
    controller.status = "Entering the match...".to_string();
    let handle = spawn_poller(
        GameStateSource(controller.api.clone()),
        GAME_POLL_INTERVAL,
        game_tx.clone(),
    );
    handle.kick();
    *game_poller = Some(handle);
}
