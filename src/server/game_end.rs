use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventHandler};
use crate::protocol::{codes, PlayerGameInfo};
use crate::registry::SessionStatus;
use crate::server::GameServer;

/// Zero-health teardown: final 1101 snapshots, room cleared and released,
/// timer stopped, both sessions demoted back to the lobby.
pub struct GameEndProcessor {
    pub server: Arc<GameServer>,
}

#[async_trait]
impl EventHandler for GameEndProcessor {
    fn name(&self) -> &'static str {
        "game_end_processor"
    }

    async fn handle(&self, event: Arc<Event>) {
        let Event::GameEnd {
            room_id,
            winner,
            loser,
        } = event.as_ref()
        else {
            return;
        };

        let server = &self.server;
        let Some(room) = server.rooms.get(room_id) else {
            debug!(%room_id, "Game end for a room that is already gone");
            return;
        };
        info!(%room_id, winner = %winner, loser = %loser, "Game ended");

        // Final snapshots go out with the closing state, before teardown.
        let snapshots: Vec<PlayerGameInfo> = {
            let st = room.read();
            st.usernames()
                .iter()
                .filter_map(|name| st.player_game_info(*room_id, name))
                .collect()
        };
        for info in &snapshots {
            match serde_json::to_value(info) {
                Ok(data) => {
                    let response = Arc::new(server.responses().success(codes::GAME_OVER, data));
                    if let Err(err) = server
                        .registry
                        .send_to_username(&info.username, response)
                        .await
                    {
                        warn!(%room_id, player = %info.username, error = %err, "Final snapshot not delivered");
                    }
                }
                Err(err) => warn!(%room_id, error = %err, "Final snapshot serialization failed"),
            }
        }

        let usernames = {
            let mut st = room.write();
            st.clear_for_teardown();
            st.usernames()
        };
        for username in usernames {
            if let Some(session) = server.registry.by_username(&username) {
                let _ = server.registry.set_status(session.id, SessionStatus::LoggedIn);
                let _ = server.registry.set_room(session.id, None);
            }
        }

        server.timers.stop(*room_id);
        server.rooms.remove(room_id);
        debug!(%room_id, "Room released");
    }
}
