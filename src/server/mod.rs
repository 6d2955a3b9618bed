//! Server orchestration: the long-lived services, the accept loop, and the
//! event processors wiring transport commands to game logic.

pub mod auth;
pub mod broadcast;
pub mod compose;
pub mod connection;
pub mod disconnect;
pub mod game_end;
pub mod matchmake;
pub mod play;
pub mod ready;
pub mod reconnect;
pub mod router;
pub mod turn_timer;

pub use turn_timer::TurnTimers;

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::{Catalogs, ResponseCatalog};
use crate::config::Config;
use crate::events::{Event, EventBus, EventKind};
use crate::game::RoomRegistry;
use crate::protocol::SessionId;
use crate::registry::SessionRegistry;
use crate::store::DuelStore;

/// The long-lived services, constructed once at startup and injected into
/// every handler. Tests seed their own instances.
pub struct GameServer {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub rooms: Arc<RoomRegistry>,
    pub catalogs: Arc<Catalogs>,
    pub store: Arc<dyn DuelStore>,
    pub bus: Arc<EventBus>,
    pub timers: Arc<TurnTimers>,
}

impl GameServer {
    /// Load the catalogs, build the services, and wire the event processors.
    pub async fn new(config: Config, store: Arc<dyn DuelStore>) -> anyhow::Result<Arc<Self>> {
        let catalogs = Arc::new(Catalogs::load(store.as_ref()).await?);
        let bus = Arc::new(EventBus::new());
        let rooms = Arc::new(RoomRegistry::new());
        let timers = Arc::new(TurnTimers::new(
            config.server.turn_duration(),
            Arc::clone(&bus),
            Arc::clone(&rooms),
        ));

        let server = Arc::new(Self {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
            rooms,
            catalogs,
            store,
            bus,
            timers,
        });
        server.register_processors();
        Ok(server)
    }

    /// Subscribe every game-logic processor. Lower numbers run first within
    /// an event kind.
    fn register_processors(self: &Arc<Self>) {
        let bus = &self.bus;
        bus.subscribe(
            EventKind::GameStart,
            10,
            Arc::new(matchmake::MatchmakeProcessor {
                server: Arc::clone(self),
            }),
        );
        bus.subscribe(
            EventKind::CardPlay,
            20,
            Arc::new(play::PlayCardProcessor {
                server: Arc::clone(self),
            }),
        );
        bus.subscribe(
            EventKind::CardCompose,
            20,
            Arc::new(compose::ComposeProcessor {
                server: Arc::clone(self),
            }),
        );
        bus.subscribe(
            EventKind::GameStateUpdate,
            50,
            Arc::new(broadcast::Broadcaster {
                server: Arc::clone(self),
            }),
        );
        bus.subscribe(
            EventKind::GameEnd,
            10,
            Arc::new(game_end::GameEndProcessor {
                server: Arc::clone(self),
            }),
        );
        bus.subscribe(
            EventKind::ClientDisconnect,
            10,
            Arc::new(disconnect::DisconnectProcessor {
                server: Arc::clone(self),
            }),
        );
        bus.subscribe(
            EventKind::ClientReconnect,
            10,
            Arc::new(reconnect::ReconnectProcessor {
                server: Arc::clone(self),
            }),
        );
        bus.subscribe(
            EventKind::ClientKicked,
            10,
            Arc::new(auth::KickProcessor {
                server: Arc::clone(self),
            }),
        );
    }

    pub fn responses(&self) -> &ResponseCatalog {
        &self.catalogs.responses
    }

    /// Send a success frame to one session; failures are logged by the
    /// registry and otherwise ignored, like any other push message.
    pub(crate) async fn respond(&self, session_id: SessionId, code: i64, data: Value) {
        let response = Arc::new(self.responses().success(code, data));
        let _ = self.registry.send_to_session(session_id, response).await;
    }

    pub(crate) async fn respond_error(&self, session_id: SessionId, code: i64) {
        let response = Arc::new(self.responses().error(code));
        let _ = self.registry.send_to_session(session_id, response).await;
    }

    /// Background idle sweeper: routes sessions past the heartbeat timeout
    /// through the disconnect path.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            let period = server.config.server.sweep_interval();
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let idle = server
                    .registry
                    .collect_idle(server.config.server.heartbeat_timeout());
                if idle.is_empty() {
                    continue;
                }
                debug!(count = idle.len(), stats = ?server.registry.stats(), "Idle sweep");
                for session_id in idle {
                    let username = server
                        .registry
                        .get(session_id)
                        .and_then(|s| s.username.clone());
                    info!(%session_id, ?username, "Evicting idle session");
                    server.bus.publish(Event::ClientDisconnect {
                        session_id,
                        username,
                        reason: "idle_timeout".to_owned(),
                    });
                }
            }
        })
    }
}
