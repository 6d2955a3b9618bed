use serde_json::json;
use tracing::debug;

use crate::events::Event;
use crate::protocol::{codes, SessionId};
use crate::registry::SessionStatus;
use crate::server::GameServer;

impl GameServer {
    /// Mark a logged-in session ready and trigger a matchmaking pass once
    /// two or more sessions are waiting.
    pub(crate) async fn handle_ready(&self, session_id: SessionId) {
        let Some(session) = self.registry.get(session_id) else {
            self.respond_error(session_id, codes::SESSION_MISSING).await;
            return;
        };
        let eligible = session.username.is_some()
            && matches!(
                session.status,
                SessionStatus::LoggedIn | SessionStatus::Ready
            );
        if !eligible {
            self.respond_error(session_id, codes::NOT_LOGGED_IN).await;
            return;
        }

        let _ = self.registry.set_status(session_id, SessionStatus::Ready);

        let ready = self.registry.sessions_by_status(SessionStatus::Ready);
        let names: Vec<String> = ready.iter().filter_map(|s| s.username.clone()).collect();
        self.respond(
            session_id,
            codes::READY_OK,
            json!({
                "ready_players": names,
                "player_count": names.len(),
            }),
        )
        .await;

        if ready.len() >= 2 {
            debug!(ready = ready.len(), "Enough ready sessions; requesting a matchmaking pass");
            self.bus.publish(Event::GameStart);
        }
    }
}
