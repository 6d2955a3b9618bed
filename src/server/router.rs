use tracing::debug;

use crate::protocol::{codes, commands, Envelope, SessionId};
use crate::server::GameServer;

impl GameServer {
    /// Decode one frame and dispatch by command tag. Protocol errors answer
    /// with a numeric code and leave the connection open.
    pub(crate) async fn dispatch_frame(&self, session_id: SessionId, raw: &str) {
        let raw = raw.trim();
        if raw.is_empty() {
            return;
        }

        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(%session_id, error = %err, "Malformed frame");
                self.respond_error(session_id, codes::UNKNOWN_COMMAND).await;
                return;
            }
        };

        match envelope.message.as_str() {
            commands::USER_REGISTER => self.handle_register(session_id, envelope.data).await,
            commands::USER_LOGIN => self.handle_login(session_id, envelope.data).await,
            commands::USER_READY | commands::USER_RESTART => self.handle_ready(session_id).await,
            commands::USER_PLAY_CARD => self.handle_play_card(session_id, envelope.data).await,
            commands::USER_COMPOSE_CARD => {
                self.handle_compose_card(session_id, envelope.data).await;
            }
            other => {
                debug!(%session_id, command = other, "Unknown command");
                self.respond_error(session_id, codes::UNKNOWN_COMMAND).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::testing::{attach_session, recv_code, test_server};

    #[tokio::test]
    async fn unknown_command_answers_9999_and_keeps_the_session() {
        let server = test_server().await;
        let (id, mut rx) = attach_session(&server, "127.0.0.1:50000");

        server
            .dispatch_frame(id, r#"{"message":"NoSuchCommand"}"#)
            .await;
        let frame = recv_code(&mut rx, 9999).await;
        assert!(frame.data.is_null());
        assert!(server.registry.get(id).is_some());
    }

    #[tokio::test]
    async fn malformed_json_answers_9999() {
        let server = test_server().await;
        let (id, mut rx) = attach_session(&server, "127.0.0.1:50001");

        server.dispatch_frame(id, "this is not json").await;
        recv_code(&mut rx, 9999).await;
        assert!(server.registry.get(id).is_some());
    }

    #[tokio::test]
    async fn blank_frames_are_ignored() {
        let server = test_server().await;
        let (id, mut rx) = attach_session(&server, "127.0.0.1:50002");

        server.dispatch_frame(id, "   ").await;
        assert!(rx.try_recv().is_err());
        assert!(server.registry.get(id).is_some());
    }
}
