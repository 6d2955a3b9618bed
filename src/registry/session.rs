use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::protocol::{Response, RoomId, SessionId};

/// Session lifecycle states. At most one session per username may be in a
/// username-holding state at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Connected,
    LoggedIn,
    Ready,
    InGame,
    WaitingReconnect,
    Disconnected,
}

impl SessionStatus {
    /// States in which the session owns its bound username.
    pub fn holds_username(self) -> bool {
        matches!(
            self,
            SessionStatus::LoggedIn
                | SessionStatus::Ready
                | SessionStatus::InGame
                | SessionStatus::WaitingReconnect
        )
    }
}

/// Server-side shutdown signal for one connection. The read loop selects on
/// [`SessionGate::closed`]; closing the gate makes the loop exit, which
/// tears the socket down.
#[derive(Debug, Default)]
pub struct SessionGate {
    closed: AtomicBool,
    notify: Notify,
}

impl SessionGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn closed(&self) {
        while !self.is_closed() {
            self.notify.notified().await;
        }
    }
}

/// One connected (or reconnect-parked) client.
#[derive(Clone)]
pub struct Session {
    pub id: SessionId,
    pub remote_addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
    pub last_activity: Instant,
    pub username: Option<String>,
    pub status: SessionStatus,
    pub room_id: Option<RoomId>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub sender: mpsc::Sender<Arc<Response>>,
    pub gate: Arc<SessionGate>,
}

impl Session {
    pub fn new(
        remote_addr: SocketAddr,
        sender: mpsc::Sender<Arc<Response>>,
        gate: Arc<SessionGate>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_addr,
            connected_at: Utc::now(),
            last_activity: Instant::now(),
            username: None,
            status: SessionStatus::Connected,
            room_id: None,
            metadata: HashMap::new(),
            sender,
            gate,
        }
    }
}
