use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::{Event, EventHandler, UpdateSource};
use crate::game::{rules, Card, CardUid, RoomError, RoomState};
use crate::protocol::{codes, ComposeCardRequest, RoomId, SessionId};
use crate::server::GameServer;

impl GameServer {
    /// Transport-side handler: shape checks (room id present, non-empty,
    /// multiple of three), then hand off to the bus.
    pub(crate) async fn handle_compose_card(&self, session_id: SessionId, data: Value) {
        let request: ComposeCardRequest = match serde_json::from_value(data) {
            Ok(request) => request,
            Err(err) => {
                debug!(%session_id, error = %err, "Malformed compose payload");
                self.respond_error(session_id, codes::UNKNOWN_COMMAND).await;
                return;
            }
        };
        if request.room_id.is_empty() {
            self.respond_error(session_id, codes::COMPOSE_MISSING_ROOM)
                .await;
            return;
        }
        if request.self_cards.is_empty() {
            self.respond_error(session_id, codes::COMPOSE_EMPTY).await;
            return;
        }
        if request.self_cards.len() % 3 != 0 {
            self.respond_error(session_id, codes::COMPOSE_NOT_TRIPLE)
                .await;
            return;
        }
        let Ok(room_id) = Uuid::parse_str(&request.room_id) else {
            self.respond_error(session_id, codes::COMPOSE_MISSING_ROOM)
                .await;
            return;
        };
        let Some(username) = self
            .registry
            .get(session_id)
            .and_then(|s| s.username.clone())
        else {
            self.respond_error(session_id, codes::NOT_LOGGED_IN).await;
            return;
        };

        self.bus.publish(Event::CardCompose {
            session_id,
            username,
            room_id,
            cards: request.self_cards,
        });
    }

    pub(crate) async fn process_compose(
        &self,
        session_id: SessionId,
        username: &str,
        room_id: RoomId,
        claims: &[Card],
    ) {
        let Some(session) = self.registry.get(session_id) else {
            debug!(%session_id, "Compose from a session that no longer exists");
            return;
        };
        if session.room_id != Some(room_id) {
            self.respond_error(session_id, codes::COMPOSE_REJECTED).await;
            return;
        }
        let Some(room) = self.rooms.get(&room_id) else {
            error!(%session_id, %room_id, "Session references a missing room");
            self.respond_error(session_id, codes::COMPOSE_REJECTED).await;
            return;
        };

        let result = {
            let mut st = room.write();
            self.apply_compose(&mut st, username, claims)
        };

        match result {
            Err(err) => {
                debug!(%session_id, username, error = %err, "Compose rejected");
                self.respond_error(session_id, codes::COMPOSE_REJECTED).await;
            }
            Ok(minted) => {
                info!(username, minted, "Cards composed");
                // Turn holder is unchanged; only the state broadcast goes out.
                self.bus.publish(Event::GameStateUpdate {
                    room_id,
                    source: UpdateSource::Compose,
                });
            }
        }
    }

    /// Group by name and run `⌊g/3⌋` compositions per group, drawing each
    /// upgrade from the pool matching the target's level. A failed pool
    /// draw skips that composition (its trio stays consumed, as the rule
    /// specifies); producing nothing at all rejects the request without
    /// touching the hand.
    fn apply_compose(
        &self,
        st: &mut RoomState,
        username: &str,
        claims: &[Card],
    ) -> Result<usize, RoomError> {
        st.ensure_playing()?;
        st.ensure_current_turn(username)?;
        let validated = st.validate_hand_cards(username, claims)?;

        let groups = rules::compose_groups(validated);
        let mut removed: Vec<CardUid> = Vec::new();
        let mut minted: Vec<Card> = Vec::new();

        for (name, group) in &groups {
            let rounds = group.len() / 3;
            if rounds == 0 {
                continue;
            }
            let Some(target) = group[0]
                .upgrade_target
                .clone()
                .filter(|target| !target.is_empty())
            else {
                debug!(card = %name, "Card is not composable");
                continue;
            };
            let Some(target_level) = self
                .catalogs
                .cards
                .deck_by_name(&target)
                .map(|deck| deck.level)
            else {
                warn!(card = %name, target = %target, "Upgrade target missing from catalog");
                continue;
            };

            for index in 0..rounds {
                let trio = &group[index * 3..index * 3 + 3];
                match st.draw_named_from_pool(&target, target_level) {
                    Some(card) => {
                        removed.extend(trio.iter().map(|c| c.uid.clone()));
                        minted.push(card);
                    }
                    None => {
                        warn!(
                            target = %target,
                            level = target_level,
                            "Upgrade pool exhausted; composition skipped"
                        );
                        removed.extend(trio.iter().map(|c| c.uid.clone()));
                    }
                }
            }
        }

        if minted.is_empty() {
            return Err(RoomError::NothingComposed);
        }
        st.remove_from_hand(username, &removed)?;
        let count = minted.len();
        for card in minted {
            st.add_card_to_hand(username, card)?;
        }
        Ok(count)
    }
}

/// Bus subscriber driving [`GameServer::process_compose`].
pub struct ComposeProcessor {
    pub server: Arc<GameServer>,
}

#[async_trait]
impl EventHandler for ComposeProcessor {
    fn name(&self) -> &'static str {
        "card_compose_processor"
    }

    async fn handle(&self, event: Arc<Event>) {
        let Event::CardCompose {
            session_id,
            username,
            room_id,
            cards,
        } = event.as_ref()
        else {
            return;
        };
        self.server
            .process_compose(*session_id, username, *room_id, cards)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PlayerGameInfo, Round};
    use crate::registry::SessionStatus;
    use crate::server::testing::{attach_session, recv_code, test_server_with};
    use crate::store::{default_seed, MemoryStore, StoreSeed};
    use crate::config::Config;

    /// Seed where level 1 is all Knights, so the dealt hand is guaranteed
    /// to hold three of a kind.
    fn knight_seed() -> StoreSeed {
        let mut seed = default_seed();
        seed.card_decks
            .retain(|d| d.name == "Knight" || d.name == "Knight Captain" || d.name == "Paladin");
        seed
    }

    #[tokio::test]
    async fn composing_three_knights_mints_a_captain() {
        let server = test_server_with(Config::default(), MemoryStore::new(knight_seed())).await;
        let (id_a, mut rx_a) = attach_session(&server, "127.0.0.1:55000");
        let (id_b, _rx_b) = attach_session(&server, "127.0.0.2:55000");
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
        let room_id = server.registry.get(id_a).expect("a").room_id.expect("room");

        let trio = info.self_cards[..3].to_vec();
        server.process_compose(id_a, "alice", room_id, &trio).await;

        let update = recv_code(&mut rx_a, 9001).await;
        let view: PlayerGameInfo = serde_json::from_value(update.data.clone()).expect("view");
        // 6 - 3 + 1 composed upgrade.
        assert_eq!(view.self_cards.len(), 4);
        let captain = view
            .self_cards
            .iter()
            .find(|c| c.name == "Knight Captain")
            .expect("upgrade in hand");
        assert_eq!(captain.level, 2);
        // Compose does not rotate the turn.
        assert_eq!(view.round, Round::Current);
    }

    #[tokio::test]
    async fn compose_shape_errors_use_the_historic_ids() {
        let server = test_server_with(Config::default(), MemoryStore::new(knight_seed())).await;
        let (id, mut rx) = attach_session(&server, "127.0.0.1:55001");

        server
            .handle_compose_card(id, serde_json::json!({"SelfCards": [] }))
            .await;
        recv_code(&mut rx, 2001).await;

        server
            .handle_compose_card(id, serde_json::json!({"Room_Id": "r", "SelfCards": [] }))
            .await;
        recv_code(&mut rx, 2002).await;

        let card = Card::mint(1, "Knight", 1.0, None, 1);
        let two = serde_json::to_value(vec![&card, &card]).expect("cards");
        server
            .handle_compose_card(id, serde_json::json!({"Room_Id": "r", "SelfCards": two }))
            .await;
        recv_code(&mut rx, 2003).await;
    }

    #[tokio::test]
    async fn compose_without_composable_cards_is_rejected() {
        // Footman has no upgrade target.
        let mut seed = default_seed();
        seed.card_decks.retain(|d| d.name == "Footman");
        let server = test_server_with(Config::default(), MemoryStore::new(seed)).await;

        let (id_a, mut rx_a) = attach_session(&server, "127.0.0.1:55002");
        let (id_b, _rx_b) = attach_session(&server, "127.0.0.2:55002");
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
        let room_id = server.registry.get(id_a).expect("a").room_id.expect("room");

        let trio = info.self_cards[..3].to_vec();
        server.process_compose(id_a, "alice", room_id, &trio).await;
        recv_code(&mut rx_a, 9002).await;

        // Hand unchanged.
        let room = server.rooms.get(&room_id).expect("room");
        assert_eq!(room.read().player("alice").expect("alice").hand.len(), 6);
    }
}
