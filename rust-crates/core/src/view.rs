use std::collections::BTreeMap;

use crate::snapshot::GameSnapshot;

/// Renderable projection of one snapshot.
///
/// Pure and deterministic: projecting the same snapshot twice yields equal
/// values, so downstream render suppression can rely on snapshot identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableView {
    /// Board cell -> players standing on it, array order preserved within a
    /// cell. Empty cells have no entry.
    pub occupancy: BTreeMap<u8, Vec<PlayerToken>>,
    /// One card per player, seat (array) order preserved.
    pub roster: Vec<PlayerCard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerToken {
    pub id: String,
    pub seat_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCard {
    pub id: String,
    pub seat_order: u32,
    pub position: u8,
    pub money: i64,
    pub holdings: usize,
}

pub fn project(snapshot: &GameSnapshot) -> TableView {
    let mut occupancy: BTreeMap<u8, Vec<PlayerToken>> = BTreeMap::new();
    for player in &snapshot.players {
        occupancy.entry(player.position).or_default().push(PlayerToken {
            id: player.id.clone(),
            seat_order: player.seat_order,
        });
    }
    let roster = snapshot
        .players
        .iter()
        .map(|player| PlayerCard {
            id: player.id.clone(),
            seat_order: player.seat_order,
            position: player.position,
            money: player.money,
            holdings: player.holdings_count(),
        })
        .collect();
    TableView { occupancy, roster }
}
