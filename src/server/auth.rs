use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::events::{Event, EventHandler};
use crate::protocol::{codes, Credentials, SessionId};
use crate::registry::SessionStatus;
use crate::server::GameServer;
use crate::store::StoreError;

impl GameServer {
    pub(crate) async fn handle_register(&self, session_id: SessionId, data: Value) {
        let creds: Credentials = match serde_json::from_value(data) {
            Ok(creds) => creds,
            Err(_) => {
                self.respond_error(session_id, codes::REGISTER_DECODE).await;
                return;
            }
        };
        if !creds.is_complete() {
            self.respond_error(session_id, codes::REGISTER_MISSING_FIELDS)
                .await;
            return;
        }

        match self
            .store
            .create_account(&creds.username, &creds.password)
            .await
        {
            Ok(()) => {
                info!(username = %creds.username, "Account registered");
                self.respond(
                    session_id,
                    codes::REGISTER_OK,
                    json!({"username": creds.username}),
                )
                .await;
            }
            Err(StoreError::AccountExists(_)) => {
                self.respond_error(session_id, codes::REGISTER_EXISTS).await;
            }
            Err(err) => {
                error!(username = %creds.username, error = %err, "Account creation failed");
                self.respond_error(session_id, codes::REGISTER_FAILED).await;
            }
        }
    }

    /// Login reconciles against the registry:
    /// no prior session → bind here; prior parked for reconnect → hand over
    /// to the reconnect processor; any other prior session → kick it, and
    /// the kick processor finishes this login.
    pub(crate) async fn handle_login(&self, session_id: SessionId, data: Value) {
        let creds: Credentials = match serde_json::from_value(data) {
            Ok(creds) => creds,
            Err(_) => {
                self.respond_error(session_id, codes::LOGIN_DECODE).await;
                return;
            }
        };
        if !creds.is_complete() {
            self.respond_error(session_id, codes::LOGIN_MISSING_FIELDS)
                .await;
            return;
        }

        let account = match self.store.fetch_account(&creds.username).await {
            Ok(account) => account,
            Err(err) => {
                error!(username = %creds.username, error = %err, "Account lookup failed");
                self.respond_error(session_id, codes::LOGIN_BACKEND).await;
                return;
            }
        };
        let valid = account.is_some_and(|row| row.password == creds.password);
        if !valid {
            self.respond_error(session_id, codes::LOGIN_INVALID).await;
            return;
        }

        match self.registry.by_username(&creds.username) {
            None => self.complete_login(session_id, &creds.username).await,
            Some(prior) if prior.status == SessionStatus::WaitingReconnect => {
                info!(
                    username = %creds.username,
                    parked = %prior.id,
                    "Login matches a parked session; resuming game"
                );
                self.bus.publish(Event::ClientReconnect {
                    session_id,
                    username: creds.username,
                });
            }
            Some(prior) => {
                info!(
                    username = %creds.username,
                    prior = %prior.id,
                    new = %session_id,
                    "Duplicate login; kicking the prior session"
                );
                self.bus.publish(Event::ClientKicked {
                    session_id: prior.id,
                    username: creds.username,
                    superseded_by: session_id,
                });
            }
        }
    }

    /// Bind the username and answer login success.
    pub(crate) async fn complete_login(&self, session_id: SessionId, username: &str) {
        match self.registry.bind_username(session_id, username) {
            Ok(_) => {
                info!(%session_id, username, "Login successful");
                self.respond(session_id, codes::LOGIN_OK, json!({"username": username}))
                    .await;
            }
            Err(err) => {
                warn!(%session_id, username, error = %err, "Login binding failed");
                self.respond_error(session_id, codes::LOGIN_BACKEND).await;
            }
        }
    }
}

/// Disconnects a superseded session and finishes the superseding login.
pub struct KickProcessor {
    pub server: Arc<GameServer>,
}

#[async_trait]
impl EventHandler for KickProcessor {
    fn name(&self) -> &'static str {
        "kick_processor"
    }

    async fn handle(&self, event: Arc<Event>) {
        let Event::ClientKicked {
            session_id,
            username,
            superseded_by,
        } = event.as_ref()
        else {
            return;
        };

        if let Some(kicked) = self.server.registry.remove(*session_id) {
            info!(
                kicked = %kicked.id,
                username,
                new = %superseded_by,
                "Kicked prior session after duplicate login"
            );
        }
        self.server.complete_login(*superseded_by, username).await;
    }
}
