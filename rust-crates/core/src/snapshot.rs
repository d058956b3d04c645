use chrono::{
    DateTime,
    Utc,
};
use serde::Deserialize;

/// Number of cells on the board. Positions wrap modulo this.
pub const BOARD_CELLS: u8 = 40;

/// Server-authoritative game state, immutable per fetch.
///
/// Seat order is array order and is stable for the lifetime of the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub players: Vec<Player>,
    pub current_turn_index: usize,
    /// Opaque identity naming which player is this client.
    pub you: String,
}

impl GameSnapshot {
    /// The player whose turn is active, if the server-reported index is valid.
    pub fn active_player(&self) -> Option<&Player> {
        self.players.get(self.current_turn_index)
    }

    pub fn player_by_id(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    /// 1-based seat assigned at game start, immutable thereafter.
    pub seat_order: u32,
    /// Board cell in 1..=40.
    pub position: u8,
    pub money: i64,
    pub properties: Vec<String>,
    pub utilities: Vec<String>,
    pub transports: Vec<String>,
}

impl Player {
    pub fn holdings_count(&self) -> usize {
        self.properties.len() + self.utilities.len() + self.transports.len()
    }
}

/// Pre-game room state. Host is always `players[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStatus {
    pub room_id: String,
    /// Human-shareable join code.
    pub room_code: String,
    /// Display names, host first.
    pub players: Vec<String>,
    pub max_players: u32,
    pub room_state: RoomState,
    /// This client's display name.
    pub user: String,
}

impl RoomStatus {
    pub fn is_host(&self) -> bool {
        self.players.first().is_some_and(|host| *host == self.user)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Waiting,
    InGame,
    Finished,
}

/// Result of one dice-roll action. Transient, consumed once by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceRoll {
    /// Each die in 1..=6, validated at the gateway.
    pub dice: [u8; 2],
    /// Always equals `dice[0] + dice[1]`; the gateway rejects anything else.
    pub total: u8,
    pub double: bool,
    /// Server-issued, for display/audit only. Never drives ordering.
    pub timestamp: DateTime<Utc>,
}

/// Static board configuration, fetched once per board+version.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoardConfig {
    pub id: String,
    pub version: String,
    pub edition: String,
    pub currency: String,
    pub currency_symbol: String,
    pub mortgage_percentage: u8,
    pub sell_percentage: u8,
    pub terms: GameTerms,
    pub cells: Vec<BoardCell>,
}

impl BoardConfig {
    pub fn cell(&self, position: u8) -> Option<&BoardCell> {
        self.cells.iter().find(|c| c.index == position)
    }
}

/// What this edition calls things. The UI never hardcodes these words.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameTerms {
    pub player: String,
    pub property: String,
    pub transport: String,
    pub utility: String,
    pub house: String,
    pub hotel: String,
    pub property_rent: String,
    pub transport_rent: String,
    pub utility_rent: String,
    pub mortgage: String,
    pub passing_go: String,
    pub salary: String,
    pub jail: String,
    pub theft: String,
    pub parking: String,
    pub income_tax: String,
    pub luxury_tax: String,
    pub community_chest: String,
    pub chance: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoardCell {
    /// 1-based position on the track.
    pub index: u8,
    pub name: String,
    pub cell_type: CellType,
    pub cell_sub_type: String,
    #[serde(default)]
    pub action_keyword: Option<String>,
    #[serde(default)]
    pub property_price: Option<u64>,
    #[serde(default)]
    pub house_price: Option<u64>,
    #[serde(default)]
    pub utility_price: Option<u64>,
    #[serde(default)]
    pub transport_price: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Property,
    Transport,
    Utility,
    Special,
}
