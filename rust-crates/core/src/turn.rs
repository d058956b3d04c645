use crate::snapshot::{
    GameSnapshot,
    Player,
};

/// Resolves "is it my turn" and the local seat from raw snapshots.
///
/// Seat assignment is immutable for the game, so the seat is derived once
/// from the first snapshot that contains the local identity and cached for
/// the session. Until then it stays unset; never an error, since the roster
/// may legitimately not include us yet.
#[derive(Debug, Default)]
pub struct TurnTracker {
    seat_order: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnView {
    pub is_your_turn: bool,
    pub seat_order: Option<u32>,
    pub active: Option<Player>,
}

impl TurnTracker {
    pub fn seat_order(&self) -> Option<u32> {
        self.seat_order
    }

    pub fn observe(&mut self, snapshot: &GameSnapshot) -> TurnView {
        if self.seat_order.is_none() {
            self.seat_order = snapshot
                .player_by_id(&snapshot.you)
                .map(|p| p.seat_order);
        }
        let active = snapshot.active_player();
        TurnView {
            is_your_turn: active.is_some_and(|p| p.id == snapshot.you),
            seat_order: self.seat_order,
            active: active.cloned(),
        }
    }
}
