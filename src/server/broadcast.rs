use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::events::{Event, EventHandler, UpdateSource};
use crate::game::RoomStatus;
use crate::protocol::{codes, PlayerGameInfo};
use crate::server::GameServer;

/// After every non-terminal mutation, sends each player their personalised
/// room view, then resets the per-turn damage ledger of the whole room.
pub struct Broadcaster {
    pub server: Arc<GameServer>,
}

#[async_trait]
impl EventHandler for Broadcaster {
    fn name(&self) -> &'static str {
        "game_state_broadcaster"
    }

    async fn handle(&self, event: Arc<Event>) {
        let Event::GameStateUpdate { room_id, source } = event.as_ref() else {
            return;
        };
        let code = match source {
            UpdateSource::PlayCard | UpdateSource::ForcedTurn => codes::PLAY_BROADCAST,
            UpdateSource::Compose => codes::COMPOSE_BROADCAST,
        };

        let server = &self.server;
        let Some(room) = server.rooms.get(room_id) else {
            debug!(%room_id, "State update for a room that is already gone");
            return;
        };

        // Snapshots are taken under the lock; sends happen outside it.
        let snapshots: Vec<PlayerGameInfo> = {
            let st = room.read();
            if st.status != RoomStatus::Playing {
                debug!(%room_id, status = ?st.status, "Skipping broadcast for a non-playing room");
                return;
            }
            st.usernames()
                .iter()
                .filter_map(|name| st.player_game_info(*room_id, name))
                .collect()
        };

        let mut delivered = 0;
        let mut failed = 0;
        for info in &snapshots {
            match serde_json::to_value(info) {
                Ok(data) => {
                    let response = Arc::new(server.responses().success(code, data));
                    if server
                        .registry
                        .send_to_username(&info.username, response)
                        .await
                        .is_ok()
                    {
                        delivered += 1;
                    } else {
                        failed += 1;
                    }
                }
                Err(err) => {
                    warn!(%room_id, error = %err, "Snapshot serialization failed");
                    failed += 1;
                }
            }
        }

        // The ledger is turn-local: it empties once the views went out.
        room.write().clear_ledgers();
        debug!(%room_id, code, delivered, failed, "Game state broadcast complete");
    }
}
