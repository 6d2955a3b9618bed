use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::events::{Event, EventHandler, UpdateSource};
use crate::game::{rules, Card, CardUid, RoomError, RoomState, RoomStatus, TargetPolicy};
use crate::protocol::{codes, PlayCardRequest, SessionId};
use crate::server::GameServer;

/// Outcome of a validated play, decided under the room lock.
enum PlayEffect {
    Continue,
    GameEnded { winner: String, loser: String },
}

impl GameServer {
    /// Transport-side handler: shape checks only, then hand off to the bus.
    pub(crate) async fn handle_play_card(&self, session_id: SessionId, data: Value) {
        let request: PlayCardRequest = match serde_json::from_value(data) {
            Ok(request) => request,
            Err(err) => {
                debug!(%session_id, error = %err, "Malformed play payload");
                self.respond_error(session_id, codes::PLAY_DECODE).await;
                return;
            }
        };
        if request.self_cards.is_empty() {
            self.respond_error(session_id, codes::PLAY_EMPTY).await;
            return;
        }
        let Some(username) = self
            .registry
            .get(session_id)
            .and_then(|s| s.username.clone())
        else {
            self.respond_error(session_id, codes::PLAY_REJECTED).await;
            return;
        };

        self.bus.publish(Event::CardPlay {
            session_id,
            username,
            cards: request.self_cards,
        });
    }

    /// Game-logic side: validate, resolve bonds, apply damage, rotate the
    /// turn, then either finish the game or draw back and broadcast.
    pub(crate) async fn process_play(
        &self,
        session_id: SessionId,
        username: &str,
        claims: &[Card],
        policy: TargetPolicy,
    ) {
        let Some(session) = self.registry.get(session_id) else {
            debug!(%session_id, "Play from a session that no longer exists");
            return;
        };
        let Some(room_id) = session.room_id else {
            self.respond_error(session_id, codes::PLAY_REJECTED).await;
            return;
        };
        let Some(room) = self.rooms.get(&room_id) else {
            error!(%session_id, %room_id, "Session references a missing room");
            self.respond_error(session_id, codes::UNKNOWN_COMMAND).await;
            return;
        };

        let effect = {
            let mut st = room.write();
            self.resolve_and_apply(&mut st, username, claims, policy)
        };

        match effect {
            Err(err) => {
                debug!(%session_id, username, error = %err, "Play rejected");
                self.respond_error(session_id, codes::PLAY_REJECTED).await;
            }
            Ok(PlayEffect::GameEnded { winner, loser }) => {
                self.bus.publish(Event::GameEnd {
                    room_id,
                    winner,
                    loser,
                });
            }
            Ok(PlayEffect::Continue) => {
                self.timers.restart(room_id);
                self.bus.publish(Event::GameStateUpdate {
                    room_id,
                    source: UpdateSource::PlayCard,
                });
            }
        }
    }

    /// Runs entirely under the room's write lock; validation happens before
    /// the first mutation so a rejected play leaves the room untouched.
    fn resolve_and_apply(
        &self,
        st: &mut RoomState,
        username: &str,
        claims: &[Card],
        policy: TargetPolicy,
    ) -> Result<PlayEffect, RoomError> {
        st.ensure_playing()?;
        st.ensure_current_turn(username)?;
        if claims.is_empty() {
            return Err(RoomError::EmptyPlay);
        }
        let validated = st.validate_hand_cards(username, claims)?;

        let outcome = rules::resolve_damage(&validated, self.catalogs.bonds.all());
        let triggered = outcome.triggered_bonds();
        debug!(
            username,
            cards = validated.len(),
            bonds = triggered.len(),
            total = outcome.total_damage,
            "Play resolved"
        );

        let records = st.apply_damage(username, policy, outcome.total_damage, &triggered)?;
        for record in &records {
            st.record_for_all(record);
        }

        let uids: Vec<CardUid> = validated.iter().map(|c| c.uid.clone()).collect();
        st.remove_from_hand(username, &uids)?;
        st.swap_turn(username)?;

        if let Some(loser) = st.defeated_player() {
            let loser = loser.username.clone();
            let winner = st
                .players()
                .iter()
                .find(|p| p.current_health > 0.0)
                .map(|p| p.username.clone())
                .unwrap_or_default();
            // Freeze the room so a straggling timer expiry cannot rotate
            // the turn while teardown is in flight.
            st.status = RoomStatus::Finished;
            return Ok(PlayEffect::GameEnded { winner, loser });
        }

        if let Err(err) = st.draw_up_to(username, self.config.game.draw_per_turn) {
            warn!(username, error = %err, "Post-play draw failed");
        }
        Ok(PlayEffect::Continue)
    }
}

/// Bus subscriber driving [`GameServer::process_play`] with the protocol's
/// fixed opponent-target policy.
pub struct PlayCardProcessor {
    pub server: Arc<GameServer>,
}

#[async_trait]
impl EventHandler for PlayCardProcessor {
    fn name(&self) -> &'static str {
        "play_card_processor"
    }

    async fn handle(&self, event: Arc<Event>) {
        let Event::CardPlay {
            session_id,
            username,
            cards,
        } = event.as_ref()
        else {
            return;
        };
        self.server
            .process_play(*session_id, username, cards, TargetPolicy::Opponent)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PlayerGameInfo, Round};
    use crate::registry::SessionStatus;
    use crate::server::testing::{attach_session, recv_code, test_server};
    use tokio::sync::mpsc;

    async fn started_game(
        server: &Arc<GameServer>,
    ) -> (
        SessionId,
        mpsc::Receiver<Arc<crate::protocol::Response>>,
        SessionId,
        mpsc::Receiver<Arc<crate::protocol::Response>>,
        PlayerGameInfo,
    ) {
        let (id_a, mut rx_a) = attach_session(server, "127.0.0.1:54000");
        let (id_b, rx_b) = attach_session(server, "127.0.0.2:54000");
        server.registry.bind_username(id_a, "alice").expect("bind");
        server.registry.bind_username(id_b, "bob").expect("bind");
        for id in [id_a, id_b] {
            server
                .registry
                .set_status(id, SessionStatus::Ready)
                .expect("ready");
        }
        let pair = [
            server.registry.get(id_a).expect("a"),
            server.registry.get(id_b).expect("b"),
        ];
        server.start_game(&pair).await.expect("start");
        let snap = recv_code(&mut rx_a, 5001).await;
        let info: PlayerGameInfo = serde_json::from_value(snap.data.clone()).expect("snapshot");
        (id_a, rx_a, id_b, rx_b, info)
    }

    #[tokio::test]
    async fn playing_one_card_damages_the_opponent_and_swaps_the_turn() {
        let server = test_server().await;
        let (id_a, mut rx_a, _id_b, mut rx_b, info) = started_game(&server).await;
        let played = info.self_cards[0].clone();
        let damage = played.damage;

        server
            .process_play(id_a, "alice", &[played.clone()], TargetPolicy::Opponent)
            .await;

        let update_a = recv_code(&mut rx_a, 8001).await;
        let update_b = recv_code(&mut rx_b, 8001).await;
        let view_a: PlayerGameInfo =
            serde_json::from_value(update_a.data.clone()).expect("view a");
        let view_b: PlayerGameInfo =
            serde_json::from_value(update_b.data.clone()).expect("view b");

        assert_eq!(view_b.health, 10.0 - damage);
        assert_eq!(view_a.round, Round::Waiting);
        assert_eq!(view_b.round, Round::Current);
        // Played one, drew up to three back: 6 - 1 + 3 = 8 (pool is large).
        assert_eq!(view_a.self_cards.len(), 8);
        assert!(!view_a.self_cards.iter().any(|c| c.uid == played.uid));

        // Both ledgers carry the same audit entry.
        for view in [&view_a, &view_b] {
            assert_eq!(view.damage_info.len(), 1);
            let record = &view.damage_info[0];
            assert_eq!(record.source, "alice");
            assert_eq!(record.target, "bob");
            assert_eq!(record.value, damage);
        }

        // Ledger is turn-local: cleared once the broadcast went out.
        let room = server
            .rooms
            .get(&server.registry.get(id_a).expect("session").room_id.expect("room"))
            .expect("room");
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                if room.read().players().iter().all(|p| p.ledger.is_empty()) {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("ledgers cleared after the broadcast");
    }

    #[tokio::test]
    async fn out_of_turn_and_foreign_cards_are_rejected() {
        let server = test_server().await;
        let (id_a, _rx_a, id_b, mut rx_b, info) = started_game(&server).await;

        // Bob is not the current player.
        let bobs_room = server.registry.get(id_b).expect("b").room_id.expect("room");
        let bobs_hand = {
            let room = server.rooms.get(&bobs_room).expect("room");
            let st = room.read();
            st.player("bob").expect("bob").hand.clone()
        };
        server
            .process_play(id_b, "bob", &bobs_hand[..1], TargetPolicy::Opponent)
            .await;
        recv_code(&mut rx_b, 5005).await;

        // A card alice does not hold.
        let ghost = Card::mint(42, "Ghost", 1.0, None, 1);
        server
            .process_play(id_a, "alice", &[ghost], TargetPolicy::Opponent)
            .await;

        // Room state is untouched by the rejections.
        let room = server.rooms.get(&bobs_room).expect("room");
        let st = room.read();
        assert_eq!(st.player("alice").expect("alice").hand.len(), 6);
        assert_eq!(st.player("bob").expect("bob").current_health, 10.0);
        drop(st);
        let _ = info;
    }

    #[tokio::test]
    async fn lethal_play_ends_the_game() {
        let server = test_server().await;
        let (id_a, mut rx_a, _id_b, mut rx_b, info) = started_game(&server).await;
        let room_id = server
            .registry
            .get(id_a)
            .expect("session")
            .room_id
            .expect("room");

        // Put bob within range of a single card.
        {
            let room = server.rooms.get(&room_id).expect("room");
            room.write().set_health("bob", 0.5).expect("preset");
        }
        let played = info.self_cards[0].clone();
        server
            .process_play(id_a, "alice", &[played], TargetPolicy::Opponent)
            .await;

        // Both players receive the final 1101 snapshot; the room and timer
        // are gone afterwards.
        recv_code(&mut rx_a, 1101).await;
        recv_code(&mut rx_b, 1101).await;
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                if server.rooms.get(&room_id).is_none() {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("room released");
        assert_eq!(server.timers.active(), 0);
        assert_eq!(
            server.registry.get(id_a).expect("session").status,
            SessionStatus::LoggedIn
        );
    }
}
