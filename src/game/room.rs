use std::collections::HashSet;
use std::sync::RwLock;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::game::{Bond, Card, CardUid};
use crate::protocol::{DamageKind, DamageRecord, OtherPlayer, PlayerGameInfo, RoomId, Round};

/// Errors produced by room operations. Every operation is all-or-nothing:
/// a returned error means the room state is unchanged.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room is full")]
    RoomFull,
    #[error("player {0} already in room")]
    PlayerExists(String),
    #[error("player {0} not found in room")]
    PlayerNotFound(String),
    #[error("room is not playing (status: {0:?})")]
    NotPlaying(RoomStatus),
    #[error("it is not {0}'s turn")]
    NotYourTurn(String),
    #[error("no cards in play request")]
    EmptyPlay,
    #[error("duplicate card uid {0} in request")]
    DuplicateCard(CardUid),
    #[error("card uid {0} not found in hand")]
    CardNotInHand(CardUid),
    #[error("card uid {0} does not match the hand copy")]
    CardMismatch(CardUid),
    #[error("hand of player {0} is full")]
    HandFull(String),
    #[error("level {0} pool has too few cards")]
    PoolExhausted(u8),
    #[error("opponent not found for player {0}")]
    NoOpponent(String),
    #[error("no composition could be performed")]
    NothingComposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

/// Who a play's damage applies to. The wire protocol currently always plays
/// against the opponent; the other policies are engine capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPolicy {
    Opponent,
    SelfHeal,
    All,
}

/// Per-room player record.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub username: String,
    pub hand: Vec<Card>,
    pub max_health: f64,
    pub current_health: f64,
    pub round: Round,
    pub ledger: Vec<DamageRecord>,
}

/// A room and its lock. State is only touched while holding the lock, and
/// the lock is never held across an await point.
pub struct Room {
    pub id: RoomId,
    state: RwLock<RoomState>,
}

impl Room {
    pub fn new(id: RoomId, initial_health: f64, max_hand_cards: usize) -> Self {
        Self {
            id,
            state: RwLock::new(RoomState {
                status: RoomStatus::Waiting,
                players: Vec::new(),
                level1_pool: Vec::new(),
                level2_pool: Vec::new(),
                level3_pool: Vec::new(),
                initial_health,
                max_hand_cards,
            }),
        }
    }

    pub fn read(&self) -> std::sync::RwLockReadGuard<'_, RoomState> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn write(&self) -> std::sync::RwLockWriteGuard<'_, RoomState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Mutable room state: players, the three level pools, and game settings.
#[derive(Debug)]
pub struct RoomState {
    pub status: RoomStatus,
    players: Vec<RoomPlayer>,
    level1_pool: Vec<Card>,
    level2_pool: Vec<Card>,
    level3_pool: Vec<Card>,
    pub initial_health: f64,
    pub max_hand_cards: usize,
}

impl RoomState {
    /// Install the freshly minted per-room pools. Called once at creation.
    pub fn install_pools(&mut self, level1: Vec<Card>, level2: Vec<Card>, level3: Vec<Card>) {
        self.level1_pool = level1;
        self.level2_pool = level2;
        self.level3_pool = level3;
    }

    pub fn add_player(&mut self, username: &str) -> Result<(), RoomError> {
        if self.players.len() >= 2 {
            return Err(RoomError::RoomFull);
        }
        if self.players.iter().any(|p| p.username == username) {
            return Err(RoomError::PlayerExists(username.to_owned()));
        }
        self.players.push(RoomPlayer {
            username: username.to_owned(),
            hand: Vec::new(),
            max_health: self.initial_health,
            current_health: self.initial_health,
            round: Round::Waiting,
            ledger: Vec::new(),
        });
        Ok(())
    }

    pub fn players(&self) -> &[RoomPlayer] {
        &self.players
    }

    pub fn usernames(&self) -> Vec<String> {
        self.players.iter().map(|p| p.username.clone()).collect()
    }

    pub fn player(&self, username: &str) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| p.username == username)
    }

    fn player_mut(&mut self, username: &str) -> Result<&mut RoomPlayer, RoomError> {
        self.players
            .iter_mut()
            .find(|p| p.username == username)
            .ok_or_else(|| RoomError::PlayerNotFound(username.to_owned()))
    }

    pub fn opponent_of(&self, username: &str) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| p.username != username)
    }

    pub fn current_player(&self) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| p.round == Round::Current)
    }

    pub fn ensure_playing(&self) -> Result<(), RoomError> {
        if self.status == RoomStatus::Playing {
            Ok(())
        } else {
            Err(RoomError::NotPlaying(self.status))
        }
    }

    pub fn ensure_current_turn(&self, username: &str) -> Result<(), RoomError> {
        let player = self
            .player(username)
            .ok_or_else(|| RoomError::PlayerNotFound(username.to_owned()))?;
        if player.round == Round::Current {
            Ok(())
        } else {
            Err(RoomError::NotYourTurn(username.to_owned()))
        }
    }

    /// Hand one player the current turn and the rest the waiting flag.
    pub fn set_current(&mut self, username: &str) -> Result<(), RoomError> {
        self.player_mut(username)?;
        for player in &mut self.players {
            player.round = if player.username == username {
                Round::Current
            } else {
                Round::Waiting
            };
        }
        Ok(())
    }

    /// Move the turn from `actor` to the other player. Returns the next
    /// turn holder's name.
    pub fn swap_turn(&mut self, actor: &str) -> Result<String, RoomError> {
        let next = self
            .opponent_of(actor)
            .map(|p| p.username.clone())
            .ok_or_else(|| RoomError::NoOpponent(actor.to_owned()))?;
        self.set_current(&next)?;
        Ok(next)
    }

    /// Turn-timer expiry path: move the turn off the current holder without
    /// knowing who they are. No-op (None) unless the room is playing with a
    /// well-defined current player.
    pub fn force_turn_end(&mut self) -> Option<(String, String)> {
        if self.status != RoomStatus::Playing {
            return None;
        }
        let holder = self.current_player()?.username.clone();
        let next = self.swap_turn(&holder).ok()?;
        Some((holder, next))
    }

    /// Validate a play or compose request against the actor's hand: every
    /// claimed uid present exactly once, no duplicates, and the claimed
    /// name/id matching the hand copy. Returns the hand-owned copies.
    pub fn validate_hand_cards(
        &self,
        username: &str,
        claims: &[Card],
    ) -> Result<Vec<Card>, RoomError> {
        let player = self
            .player(username)
            .ok_or_else(|| RoomError::PlayerNotFound(username.to_owned()))?;

        let mut seen: HashSet<&str> = HashSet::with_capacity(claims.len());
        let mut validated = Vec::with_capacity(claims.len());
        for claim in claims {
            if !seen.insert(claim.uid.as_str()) {
                return Err(RoomError::DuplicateCard(claim.uid.clone()));
            }
            let held = player
                .hand
                .iter()
                .find(|c| c.uid == claim.uid)
                .ok_or_else(|| RoomError::CardNotInHand(claim.uid.clone()))?;
            if !held.same_template(claim) {
                return Err(RoomError::CardMismatch(claim.uid.clone()));
            }
            validated.push(held.clone());
        }
        Ok(validated)
    }

    /// Remove the given uids from the actor's hand. Fails without mutating
    /// when any uid is missing.
    pub fn remove_from_hand(&mut self, username: &str, uids: &[CardUid]) -> Result<(), RoomError> {
        let player = self.player_mut(username)?;
        for uid in uids {
            if !player.hand.iter().any(|c| &c.uid == uid) {
                return Err(RoomError::CardNotInHand(uid.clone()));
            }
        }
        player.hand.retain(|c| !uids.contains(&c.uid));
        Ok(())
    }

    pub fn add_card_to_hand(&mut self, username: &str, card: Card) -> Result<(), RoomError> {
        let max_hand = self.max_hand_cards;
        let player = self.player_mut(username)?;
        if player.hand.len() >= max_hand {
            return Err(RoomError::HandFull(username.to_owned()));
        }
        player.hand.push(card);
        Ok(())
    }

    /// Clamp-set a player's health into `[0, max_health]`.
    pub fn set_health(&mut self, username: &str, health: f64) -> Result<(), RoomError> {
        let player = self.player_mut(username)?;
        player.current_health = health.clamp(0.0, player.max_health);
        Ok(())
    }

    /// Apply a resolved play's total damage according to the target policy
    /// and return the ledger records describing what happened.
    pub fn apply_damage(
        &mut self,
        actor: &str,
        policy: TargetPolicy,
        value: f64,
        triggered_bonds: &[Bond],
    ) -> Result<Vec<DamageRecord>, RoomError> {
        match policy {
            TargetPolicy::Opponent => {
                let opponent = self
                    .opponent_of(actor)
                    .map(|p| p.username.clone())
                    .ok_or_else(|| RoomError::NoOpponent(actor.to_owned()))?;
                let current = self
                    .player(&opponent)
                    .map(|p| p.current_health)
                    .unwrap_or_default();
                self.set_health(&opponent, current - value)?;
                Ok(vec![DamageRecord {
                    source: actor.to_owned(),
                    target: opponent,
                    kind: DamageKind::Attacked,
                    value,
                    triggered_bonds: triggered_bonds.to_vec(),
                }])
            }
            TargetPolicy::SelfHeal => {
                let current = self
                    .player(actor)
                    .map(|p| p.current_health)
                    .ok_or_else(|| RoomError::PlayerNotFound(actor.to_owned()))?;
                self.set_health(actor, current + value)?;
                Ok(vec![DamageRecord {
                    source: actor.to_owned(),
                    target: actor.to_owned(),
                    kind: DamageKind::Healed,
                    value,
                    triggered_bonds: triggered_bonds.to_vec(),
                }])
            }
            TargetPolicy::All => {
                let targets: Vec<String> = self
                    .players
                    .iter()
                    .filter(|p| p.username != actor)
                    .map(|p| p.username.clone())
                    .collect();
                let mut records = Vec::with_capacity(targets.len());
                for target in targets {
                    let current = self
                        .player(&target)
                        .map(|p| p.current_health)
                        .unwrap_or_default();
                    self.set_health(&target, current - value)?;
                    records.push(DamageRecord {
                        source: actor.to_owned(),
                        target,
                        kind: DamageKind::Attacked,
                        value,
                        triggered_bonds: triggered_bonds.to_vec(),
                    });
                }
                Ok(records)
            }
        }
    }

    /// Append a ledger entry to every player so both sides receive the same
    /// audit on the next broadcast.
    pub fn record_for_all(&mut self, record: &DamageRecord) {
        for player in &mut self.players {
            player.ledger.push(record.clone());
        }
    }

    /// Reset the turn-local ledger of every player. Runs after each
    /// successful broadcast.
    pub fn clear_ledgers(&mut self) {
        for player in &mut self.players {
            player.ledger.clear();
        }
    }

    pub fn defeated_player(&self) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| p.current_health <= 0.0)
    }

    fn pool_mut(&mut self, level: u8) -> Result<&mut Vec<Card>, RoomError> {
        match level {
            1 => Ok(&mut self.level1_pool),
            2 => Ok(&mut self.level2_pool),
            3 => Ok(&mut self.level3_pool),
            other => Err(RoomError::PoolExhausted(other)),
        }
    }

    pub fn pool_len(&self, level: u8) -> usize {
        match level {
            1 => self.level1_pool.len(),
            2 => self.level2_pool.len(),
            3 => self.level3_pool.len(),
            _ => 0,
        }
    }

    /// Draw `count` cards uniformly at random, without replacement, from the
    /// level-1 pool. Fails without drawing when the pool is short.
    pub fn draw_random_level1(&mut self, count: usize) -> Result<Vec<Card>, RoomError> {
        if self.level1_pool.len() < count {
            return Err(RoomError::PoolExhausted(1));
        }
        let mut rng = rand::thread_rng();
        let mut drawn = Vec::with_capacity(count);
        for _ in 0..count {
            let index = rng.gen_range(0..self.level1_pool.len());
            drawn.push(self.level1_pool.swap_remove(index));
        }
        Ok(drawn)
    }

    /// Return cards to the level-1 pool (failed draw-and-add sequences).
    pub fn return_to_level1(&mut self, cards: Vec<Card>) {
        self.level1_pool.extend(cards);
    }

    /// Remove and return the first pool card with the given name from the
    /// given level pool. Used by the compose rule to materialise upgrades.
    pub fn draw_named_from_pool(&mut self, name: &str, level: u8) -> Option<Card> {
        let pool = self.pool_mut(level).ok()?;
        let index = pool.iter().position(|c| c.name == name)?;
        Some(pool.remove(index))
    }

    /// Deal `count` random level-1 cards into the player's hand.
    pub fn deal_initial(&mut self, username: &str, count: usize) -> Result<(), RoomError> {
        self.player_mut(username)?;
        let mut drawn = self.draw_random_level1(count)?;
        while let Some(card) = drawn.pop() {
            // Initial deals never exceed the hand cap; return the remainder
            // on the defensive path anyway so no instance is lost.
            if let Err(err) = self.add_card_to_hand(username, card.clone()) {
                drawn.push(card);
                self.return_to_level1(drawn);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Draw up to `count` level-1 cards into the actor's hand, clamped by
    /// the hand cap and the pool size. Cards already drawn are returned to
    /// the pool if an add fails mid-way.
    pub fn draw_up_to(&mut self, username: &str, count: usize) -> Result<usize, RoomError> {
        let free_slots = {
            let max_hand = self.max_hand_cards;
            let player = self.player(username).ok_or_else(|| {
                RoomError::PlayerNotFound(username.to_owned())
            })?;
            max_hand.saturating_sub(player.hand.len())
        };
        let take = count.min(free_slots).min(self.level1_pool.len());
        if take == 0 {
            return Ok(0);
        }

        let mut drawn = self.draw_random_level1(take)?;
        let mut added = 0;
        while let Some(card) = drawn.pop() {
            if let Err(err) = self.add_card_to_hand(username, card.clone()) {
                drawn.push(card);
                self.return_to_level1(drawn);
                return Err(err);
            }
            added += 1;
        }
        Ok(added)
    }

    /// Multiset of every card instance currently owned by the room (pools
    /// and hands). Supports the conservation checks in tests and teardown.
    pub fn all_instance_uids(&self) -> Vec<CardUid> {
        let mut uids: Vec<CardUid> = self
            .level1_pool
            .iter()
            .chain(self.level2_pool.iter())
            .chain(self.level3_pool.iter())
            .map(|c| c.uid.clone())
            .collect();
        for player in &self.players {
            uids.extend(player.hand.iter().map(|c| c.uid.clone()));
        }
        uids
    }

    /// End-of-game teardown: drop pools, hands, ledgers and turn flags.
    pub fn clear_for_teardown(&mut self) {
        self.status = RoomStatus::Finished;
        self.level1_pool.clear();
        self.level2_pool.clear();
        self.level3_pool.clear();
        for player in &mut self.players {
            player.hand.clear();
            player.ledger.clear();
            player.round = Round::Waiting;
        }
    }

    /// Build the personalised snapshot for one player.
    pub fn player_game_info(&self, room_id: RoomId, username: &str) -> Option<PlayerGameInfo> {
        let me = self.player(username)?;
        let others = self
            .players
            .iter()
            .filter(|p| p.username != username)
            .map(|p| OtherPlayer {
                username: p.username.clone(),
                round: p.round,
                health: p.current_health,
                cards_count: p.hand.len(),
            })
            .collect();
        Some(PlayerGameInfo {
            room_id: room_id.to_string(),
            username: me.username.clone(),
            round: me.round,
            health: me.current_health,
            self_cards: me.hand.clone(),
            other_players: others,
            damage_info: me.ledger.clone(),
        })
    }
}
