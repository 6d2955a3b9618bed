use serde::{Deserialize, Serialize};

use crate::game::{Bond, Card};

/// Turn flag of a player while the room is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Round {
    Current,
    Waiting,
}

/// What a damage event did to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageKind {
    Attacked,
    Healed,
}

/// One entry of the turn-local damage ledger. Every player in the room
/// receives the same entries on the next broadcast, then the ledger clears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageRecord {
    #[serde(rename = "DamageSource")]
    pub source: String,
    #[serde(rename = "DamageTarget")]
    pub target: String,
    #[serde(rename = "DamageType")]
    pub kind: DamageKind,
    #[serde(rename = "DamageValue")]
    pub value: f64,
    #[serde(rename = "TriggeredBonds")]
    pub triggered_bonds: Vec<Bond>,
}

/// Opponent summary inside a personalised snapshot. Deliberately excludes
/// the opponent's hand contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherPlayer {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Round")]
    pub round: Round,
    #[serde(rename = "Health")]
    pub health: f64,
    #[serde(rename = "CardsCount")]
    pub cards_count: usize,
}

/// The personalised room view sent to one player after every mutation,
/// at game start (5001), reconnect (6001), and game end (1101).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerGameInfo {
    #[serde(rename = "Room_Id")]
    pub room_id: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Round")]
    pub round: Round,
    #[serde(rename = "Health")]
    pub health: f64,
    #[serde(rename = "SelfCards")]
    pub self_cards: Vec<Card>,
    #[serde(rename = "OtherPlayers")]
    pub other_players: Vec<OtherPlayer>,
    #[serde(rename = "DamageInfo")]
    pub damage_info: Vec<DamageRecord>,
}
