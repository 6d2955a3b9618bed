use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventHandler};
use crate::game::RoomStatus;
use crate::protocol::{codes, PlayerGameInfo, RoomId, SessionId};
use crate::registry::{Session, SessionStatus};
use crate::server::GameServer;

/// Pairs ready sessions into a fresh room and starts the game.
pub struct MatchmakeProcessor {
    pub server: Arc<GameServer>,
}

#[async_trait]
impl EventHandler for MatchmakeProcessor {
    fn name(&self) -> &'static str {
        "matchmake_processor"
    }

    async fn handle(&self, event: Arc<Event>) {
        if !matches!(event.as_ref(), Event::GameStart) {
            return;
        }

        let mut ready = self
            .server
            .registry
            .sessions_by_status(SessionStatus::Ready);
        ready.retain(|s| s.username.is_some());
        // Deterministic within a pass: FIFO by connect time, then id.
        ready.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        if ready.len() < 2 {
            debug!(ready = ready.len(), "Not enough ready sessions for a pass");
            return;
        }

        let pair = [ready[0].clone(), ready[1].clone()];
        if let Err(err) = self.server.start_game(&pair).await {
            warn!(error = %err, "Matchmaking pass failed");
        }
    }
}

impl GameServer {
    /// Build the room, seat and deal both players, hand the first mover the
    /// turn, start the timer, and push the 5001 snapshots. Any failure
    /// before the snapshots tears the room down and re-queues the players.
    pub(crate) async fn start_game(&self, pair: &[Session; 2]) -> anyhow::Result<()> {
        let usernames: Vec<String> = pair.iter().filter_map(|s| s.username.clone()).collect();
        if usernames.len() != 2 {
            bail!("ready session without a bound username");
        }

        let game_cfg = &self.config.game;
        let room = self
            .rooms
            .create(game_cfg.initial_health, game_cfg.max_hand_cards);
        let room_id = room.id;

        let seatwork: Result<(), crate::game::RoomError> = (|| {
            let (level1, level2, level3) = self.catalogs.cards.mint_pools();
            let mut st = room.write();
            st.install_pools(level1, level2, level3);
            debug!(
                %room_id,
                l1 = st.pool_len(1),
                l2 = st.pool_len(2),
                l3 = st.pool_len(3),
                "Room pools minted"
            );
            for name in &usernames {
                st.add_player(name)?;
            }
            for name in &usernames {
                st.deal_initial(name, game_cfg.initial_hand_size)?;
            }
            // First mover is the first of the pair.
            st.set_current(&usernames[0])?;
            st.status = RoomStatus::Playing;
            Ok(())
        })();
        if let Err(err) = seatwork {
            self.abort_game_start(room_id, pair);
            return Err(err).context("seating players");
        }

        for session in pair {
            let seated = self
                .registry
                .try_transition(session.id, SessionStatus::Ready, SessionStatus::InGame)
                && self.registry.set_room(session.id, Some(room_id)).is_ok();
            if !seated {
                self.abort_game_start(room_id, pair);
                bail!("session {} left the ready state mid-pass", session.id);
            }
        }

        let snapshots: Vec<(SessionId, PlayerGameInfo)> = {
            let st = room.read();
            pair.iter()
                .filter_map(|session| {
                    let name = session.username.as_deref()?;
                    Some((session.id, st.player_game_info(room_id, name)?))
                })
                .collect()
        };

        self.timers.restart(room_id);
        for (session_id, info) in snapshots {
            match serde_json::to_value(&info) {
                Ok(data) => self.respond(session_id, codes::GAME_START, data).await,
                Err(err) => warn!(%session_id, error = %err, "Snapshot serialization failed"),
            }
        }

        info!(%room_id, players = ?usernames, "Game started");
        Ok(())
    }

    fn abort_game_start(&self, room_id: RoomId, pair: &[Session; 2]) {
        self.timers.stop(room_id);
        self.rooms.remove(&room_id);
        for session in pair {
            let _ = self.registry.set_room(session.id, None);
            let _ = self
                .registry
                .try_transition(session.id, SessionStatus::InGame, SessionStatus::Ready);
        }
        warn!(%room_id, "Game start rolled back; players returned to the ready queue");
    }
}
