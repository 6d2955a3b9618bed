use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::events::{Event, EventHandler};
use crate::protocol::{codes, RoomId};
use crate::registry::SessionStatus;
use crate::server::GameServer;

/// Transport-loss handling: anonymous and lobby sessions are dropped; a
/// session inside a game is parked as `WaitingReconnect` and the peer is
/// told the player went offline.
pub struct DisconnectProcessor {
    pub server: Arc<GameServer>,
}

#[async_trait]
impl EventHandler for DisconnectProcessor {
    fn name(&self) -> &'static str {
        "disconnect_processor"
    }

    async fn handle(&self, event: Arc<Event>) {
        let Event::ClientDisconnect {
            session_id,
            username: _,
            reason,
        } = event.as_ref()
        else {
            return;
        };

        let server = &self.server;
        let Some(session) = server.registry.get(*session_id) else {
            // Already removed (kick, eviction race): nothing left to do.
            return;
        };

        match (&session.username, session.status, session.room_id) {
            // Duplicate notification for a session that is already parked.
            (_, SessionStatus::WaitingReconnect, _) => {}
            (Some(name), SessionStatus::InGame, Some(room_id)) => {
                if server.rooms.get(&room_id).is_none() {
                    debug!(%session_id, %room_id, "In-game session lost after room teardown");
                    server.registry.remove(*session_id);
                    return;
                }
                let _ = server
                    .registry
                    .set_status(*session_id, SessionStatus::WaitingReconnect);
                // The socket is dead either way; make the read loop exit.
                session.gate.close();
                info!(
                    %session_id,
                    username = %name,
                    %room_id,
                    reason,
                    "Player went offline during a game; parked for reconnect"
                );
                server.notify_peer_offline(room_id, name, reason).await;
            }
            (Some(name), _, _) => {
                server.registry.remove(*session_id);
                info!(%session_id, username = %name, reason, "Logged-in session disconnected");
            }
            (None, _, _) => {
                server.registry.remove(*session_id);
                debug!(%session_id, reason, "Anonymous session disconnected");
            }
        }
    }
}

impl GameServer {
    /// 7001 to every other player in the room.
    pub(crate) async fn notify_peer_offline(&self, room_id: RoomId, username: &str, reason: &str) {
        let Some(room) = self.rooms.get(&room_id) else {
            return;
        };
        let peers: Vec<String> = room
            .read()
            .usernames()
            .into_iter()
            .filter(|name| name != username)
            .collect();
        let payload = json!({
            "message_type": "player_disconnect",
            "username": username,
            "status": "waiting_reconnect",
            "reason": reason,
            "room_id": room_id,
        });
        for peer in peers {
            let response = Arc::new(
                self.responses()
                    .success(codes::PEER_OFFLINE, payload.clone()),
            );
            if let Err(err) = self.registry.send_to_username(&peer, response).await {
                warn!(%room_id, peer = %peer, error = %err, "Offline notice not delivered");
            }
        }
    }
}
