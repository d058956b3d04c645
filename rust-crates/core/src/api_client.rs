use std::fmt;

use chrono::{
    DateTime,
    Utc,
};
use reqwest::StatusCode;
use serde::{
    Deserialize,
    de::DeserializeOwned,
};
use serde_json::json;

use crate::{
    RemoteError,
    Result,
    snapshot::{
        BOARD_CELLS,
        BoardConfig,
        DiceRoll,
        GameSnapshot,
        Player,
        RoomState,
        RoomStatus,
    },
};

/// Typed client for the game server's REST surface.
///
/// One request/response round trip per call; no retry, no caching. Retry
/// policy belongs to the callers (poller, roll executor).
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .map_err(|source| RemoteError::Transport {
                endpoint: "client setup",
                source,
            })?;
        Ok(Self { base_url, http })
    }

    /// `GET /api/game/board/{board_id}/version/{version}`
    pub async fn board_config(&self, board_id: &str, version: &str) -> Result<BoardConfig> {
        const ENDPOINT: &str = "/api/game/board";
        let url = format!(
            "{}/api/game/board/{}/version/{}",
            self.base_url, board_id, version
        );
        let envelope: DataEnvelope<BoardConfig> = self.get_json(ENDPOINT, url).await?;
        let config = envelope.data;
        if config.cells.len() != usize::from(BOARD_CELLS) {
            return Err(RemoteError::payload(
                ENDPOINT,
                format!("expected {} cells, got {}", BOARD_CELLS, config.cells.len()),
            ));
        }
        Ok(config)
    }

    /// `GET /api/game/state`
    pub async fn game_snapshot(&self) -> Result<GameSnapshot> {
        const ENDPOINT: &str = "/api/game/state";
        let url = format!("{}/api/game/state", self.base_url);
        let envelope: DataEnvelope<GameStateDto> = self.get_json(ENDPOINT, url).await?;
        let dto = envelope.data;
        for player in &dto.players {
            if player.position < 1 || player.position > BOARD_CELLS {
                return Err(RemoteError::payload(
                    ENDPOINT,
                    format!(
                        "player {} at position {} is off the board",
                        player.player_id, player.position
                    ),
                ));
            }
        }
        Ok(dto.into())
    }

    /// `GET /api/room/status`
    pub async fn room_status(&self) -> Result<RoomStatus> {
        const ENDPOINT: &str = "/api/room/status";
        let url = format!("{}/api/room/status", self.base_url);
        let envelope: DataEnvelope<RoomStatusDto> = self.get_json(ENDPOINT, url).await?;
        Ok(envelope.data.into())
    }

    /// `POST /api/game/roll-dice`
    ///
    /// Not idempotent server-side; the roll executor's single-flight lock is
    /// what prevents duplicate submission.
    pub async fn roll_dice(&self, game_id: &str, player_id: &str) -> Result<DiceRoll> {
        const ENDPOINT: &str = "/api/game/roll-dice";
        let url = format!("{}/api/game/roll-dice", self.base_url);
        let body = json!({ "gameId": game_id, "playerId": player_id });
        let envelope: DataEnvelope<DiceRollDto> = self.post_json(ENDPOINT, url, &body).await?;
        let dto = envelope.data;
        for die in dto.dice {
            if die < 1 || die > 6 {
                return Err(RemoteError::payload(
                    ENDPOINT,
                    format!("die face {die} out of range"),
                ));
            }
        }
        if dto.total != dto.dice[0] + dto.dice[1] {
            return Err(RemoteError::payload(
                ENDPOINT,
                format!(
                    "total {} does not match dice {} + {}",
                    dto.total, dto.dice[0], dto.dice[1]
                ),
            ));
        }
        Ok(dto.into())
    }

    /// `POST /api/room/create` — returns the shareable room code.
    pub async fn create_room(&self) -> Result<String> {
        const ENDPOINT: &str = "/api/room/create";
        let url = format!("{}/api/room/create", self.base_url);
        let created: CreateRoomDto = self.post_json(ENDPOINT, url, &json!({})).await?;
        Ok(created.data.room_code)
    }

    /// `POST /api/room/join`
    pub async fn join_room(&self, room_code: &str) -> Result<()> {
        const ENDPOINT: &str = "/api/room/join";
        let url = format!("{}/api/room/join", self.base_url);
        let body = json!({ "roomCode": room_code });
        let ack: AckDto = self.post_json(ENDPOINT, url, &body).await?;
        ack.into_result(ENDPOINT)
    }

    /// `POST /api/room/start` — host only; the explicit action that moves a
    /// room out of WAITING.
    pub async fn start_room(&self) -> Result<()> {
        const ENDPOINT: &str = "/api/room/start";
        let url = format!("{}/api/room/start", self.base_url);
        let ack: AckDto = self.post_json(ENDPOINT, url, &json!({})).await?;
        ack.into_result(ENDPOINT)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str, url: String) -> Result<T> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| RemoteError::Transport { endpoint, source })?;
        Self::read_body(endpoint, res).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: String,
        body: &serde_json::Value,
    ) -> Result<T> {
        let res = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| RemoteError::Transport { endpoint, source })?;
        Self::read_body(endpoint, res).await
    }

    async fn read_body<T: DeserializeOwned>(
        endpoint: &'static str,
        res: reqwest::Response,
    ) -> Result<T> {
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|source| RemoteError::Transport { endpoint, source })?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                endpoint,
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| RemoteError::payload(endpoint, err.to_string()))
    }
}

impl fmt::Display for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct GameStateDto {
    players: Vec<PlayerDto>,
    #[serde(rename = "currentTurnIndex")]
    current_turn_index: usize,
    you: String,
}

#[derive(Deserialize)]
struct PlayerDto {
    player_id: String,
    player_turn: u32,
    position: u8,
    player_money: i64,
    #[serde(default)]
    property_owns: Vec<String>,
    #[serde(default)]
    utility_owns: Vec<String>,
    #[serde(default)]
    transport_owns: Vec<String>,
}

#[derive(Deserialize)]
struct RoomStatusDto {
    #[serde(rename = "roomId")]
    room_id: String,
    #[serde(rename = "roomCode")]
    room_code: String,
    players: Vec<String>,
    #[serde(rename = "maxPlayers")]
    max_players: u32,
    #[serde(rename = "roomState")]
    room_state: RoomStateDto,
    user: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum RoomStateDto {
    Waiting,
    InGame,
    Finished,
}

#[derive(Deserialize)]
struct DiceRollDto {
    dice: [u8; 2],
    total: u8,
    #[serde(default)]
    double: bool,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct CreateRoomDto {
    #[allow(dead_code)]
    #[serde(default)]
    message: String,
    data: RoomCodeDto,
}

#[derive(Deserialize)]
struct RoomCodeDto {
    #[serde(rename = "roomCode")]
    room_code: String,
}

#[derive(Deserialize)]
struct AckDto {
    success: bool,
    #[serde(default)]
    message: String,
}

impl AckDto {
    fn into_result(self, endpoint: &'static str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(RemoteError::Rejected {
                endpoint,
                message: self.message,
            })
        }
    }
}

impl From<GameStateDto> for GameSnapshot {
    fn from(dto: GameStateDto) -> Self {
        GameSnapshot {
            players: dto.players.into_iter().map(Into::into).collect(),
            current_turn_index: dto.current_turn_index,
            you: dto.you,
        }
    }
}

impl From<PlayerDto> for Player {
    fn from(dto: PlayerDto) -> Self {
        Player {
            id: dto.player_id,
            seat_order: dto.player_turn,
            position: dto.position,
            money: dto.player_money,
            properties: dto.property_owns,
            utilities: dto.utility_owns,
            transports: dto.transport_owns,
        }
    }
}

impl From<RoomStatusDto> for RoomStatus {
    fn from(dto: RoomStatusDto) -> Self {
        RoomStatus {
            room_id: dto.room_id,
            room_code: dto.room_code,
            players: dto.players,
            max_players: dto.max_players,
            room_state: dto.room_state.into(),
            user: dto.user,
        }
    }
}

impl From<RoomStateDto> for RoomState {
    fn from(value: RoomStateDto) -> Self {
        match value {
            RoomStateDto::Waiting => RoomState::Waiting,
            RoomStateDto::InGame => RoomState::InGame,
            RoomStateDto::Finished => RoomState::Finished,
        }
    }
}

impl From<DiceRollDto> for DiceRoll {
    fn from(dto: DiceRollDto) -> Self {
        DiceRoll {
            dice: dto.dice,
            total: dto.total,
            double: dto.double,
            timestamp: dto.timestamp,
        }
    }
}
