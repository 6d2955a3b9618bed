use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::events::{Event, EventHandler};
use crate::protocol::{codes, SessionId};
use crate::registry::SessionStatus;
use crate::server::GameServer;

/// Resumes a parked game on a fresh login: the username moves to the new
/// session, which receives a full snapshot; the peer is told the player is
/// back. Game state itself is untouched.
pub struct ReconnectProcessor {
    pub server: Arc<GameServer>,
}

#[async_trait]
impl EventHandler for ReconnectProcessor {
    fn name(&self) -> &'static str {
        "reconnection_processor"
    }

    async fn handle(&self, event: Arc<Event>) {
        let Event::ClientReconnect {
            session_id,
            username,
        } = event.as_ref()
        else {
            return;
        };

        if let Err(reason) = self.server.try_resume(*session_id, username).await {
            warn!(%session_id, username, reason, "Reconnection failed; falling back to login");
            self.server
                .respond_error(*session_id, codes::RECONNECT_FAILED)
                .await;
            // Resume the normal login path for the fresh session.
            self.server.complete_login(*session_id, username).await;
        }
    }
}

impl GameServer {
    async fn try_resume(
        &self,
        new_session: SessionId,
        username: &str,
    ) -> Result<(), &'static str> {
        let prior = self
            .registry
            .by_username(username)
            .ok_or("no session holds the username")?;
        if prior.status != SessionStatus::WaitingReconnect {
            return Err("player is not waiting for reconnection");
        }
        let room_id = prior.room_id.ok_or("parked session has no room")?;
        let room = self.rooms.get(&room_id).ok_or("room no longer exists")?;
        let info = room
            .read()
            .player_game_info(room_id, username)
            .ok_or("player absent from the room")?;
        let data = serde_json::to_value(&info).map_err(|_| "snapshot serialization failed")?;

        // Identity handover: old record out, username onto the new session.
        self.registry.remove(prior.id);
        self.registry
            .bind_username(new_session, username)
            .map_err(|_| "new session vanished")?;
        let _ = self.registry.set_status(new_session, SessionStatus::InGame);
        let _ = self.registry.set_room(new_session, Some(room_id));

        self.respond(new_session, codes::RECONNECT_OK, data).await;

        let peers: Vec<String> = room
            .read()
            .usernames()
            .into_iter()
            .filter(|name| name != username)
            .collect();
        let payload = json!({
            "message_type": "player_reconnect",
            "username": username,
            "status": "online",
            "room_id": room_id,
            "timestamp": Utc::now().timestamp(),
        });
        for peer in peers {
            let response = Arc::new(
                self.responses()
                    .success(codes::PEER_RECONNECTED, payload.clone()),
            );
            let _ = self.registry.send_to_username(&peer, response).await;
        }

        info!(
            username,
            %new_session,
            old_session = %prior.id,
            %room_id,
            "Player reconnected into their game"
        );
        Ok(())
    }
}
