//! Connection registry: every live client session, indexed by session id,
//! remote address, and bound username.

pub mod session;

pub use session::{Session, SessionGate, SessionStatus};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::protocol::{Response, RoomId, SessionId};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("no live session for user {0}")]
    UserNotConnected(String),
    #[error("send channel closed for session {0}")]
    ChannelClosed(SessionId),
}

/// Reads are served lock-free from the DashMap indexes; every multi-index
/// mutation serializes on `mutation` so the indexes never disagree.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
    by_addr: DashMap<SocketAddr, SessionId>,
    by_username: DashMap<String, SessionId>,
    mutation: Mutex<()>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            by_addr: DashMap::new(),
            by_username: DashMap::new(),
            mutation: Mutex::new(()),
        }
    }

    fn mutation_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.mutation
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a freshly accepted session. A prior session from the same
    /// remote address is removed first and returned.
    pub fn add(&self, session: Session) -> Option<Session> {
        let _guard = self.mutation_guard();
        let displaced = self
            .by_addr
            .get(&session.remote_addr)
            .map(|entry| *entry.value())
            .and_then(|prior_id| self.remove_locked(prior_id));
        if let Some(prior) = &displaced {
            info!(
                prior_session = %prior.id,
                addr = %session.remote_addr,
                "Replacing existing connection from the same address"
            );
        }
        self.by_addr.insert(session.remote_addr, session.id);
        debug!(session_id = %session.id, addr = %session.remote_addr, "Session registered");
        self.sessions.insert(session.id, session);
        displaced
    }

    /// Remove a session from every index and close its connection gate.
    pub fn remove(&self, id: SessionId) -> Option<Session> {
        let _guard = self.mutation_guard();
        self.remove_locked(id)
    }

    fn remove_locked(&self, id: SessionId) -> Option<Session> {
        let (_, session) = self.sessions.remove(&id)?;
        if let Some(entry) = self.by_addr.get(&session.remote_addr) {
            if *entry.value() == id {
                drop(entry);
                self.by_addr.remove(&session.remote_addr);
            }
        }
        if let Some(username) = &session.username {
            if let Some(entry) = self.by_username.get(username) {
                if *entry.value() == id {
                    drop(entry);
                    self.by_username.remove(username);
                }
            }
        }
        session.gate.close();
        debug!(session_id = %id, username = ?session.username, "Session removed");
        Some(session)
    }

    /// Bind a username to a session and mark it logged in. A different live
    /// session already holding the username is removed first (returned so
    /// the caller can log it).
    pub fn bind_username(&self, id: SessionId, username: &str) -> Result<Option<Session>, RegistryError> {
        let _guard = self.mutation_guard();
        if !self.sessions.contains_key(&id) {
            return Err(RegistryError::SessionNotFound(id));
        }
        let displaced = self
            .by_username
            .get(username)
            .map(|entry| *entry.value())
            .filter(|prior| *prior != id)
            .and_then(|prior| self.remove_locked(prior));
        if let Some(prior) = &displaced {
            warn!(
                username,
                prior_session = %prior.id,
                new_session = %id,
                "Username rebound; prior session removed"
            );
        }
        if let Some(mut session) = self.sessions.get_mut(&id) {
            session.username = Some(username.to_owned());
            session.status = SessionStatus::LoggedIn;
        }
        self.by_username.insert(username.to_owned(), id);
        Ok(displaced)
    }

    /// Clear the username binding, returning the session to `Connected`.
    pub fn unbind_username(&self, id: SessionId) {
        let _guard = self.mutation_guard();
        if let Some(mut session) = self.sessions.get_mut(&id) {
            if let Some(username) = session.username.take() {
                drop(session);
                if let Some(entry) = self.by_username.get(&username) {
                    if *entry.value() == id {
                        drop(entry);
                        self.by_username.remove(&username);
                    }
                }
                if let Some(mut session) = self.sessions.get_mut(&id) {
                    session.status = SessionStatus::Connected;
                }
            }
        }
    }

    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn by_username(&self, username: &str) -> Option<Session> {
        let id = *self.by_username.get(username)?.value();
        self.get(id)
    }

    pub fn by_addr(&self, addr: &SocketAddr) -> Option<Session> {
        let id = *self.by_addr.get(addr)?.value();
        self.get(id)
    }

    pub fn set_status(&self, id: SessionId, status: SessionStatus) -> Result<(), RegistryError> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(RegistryError::SessionNotFound(id))?;
        session.status = status;
        Ok(())
    }

    /// Atomically move a session from one status to another. Returns false
    /// when the session is gone or no longer in `from` (a concurrent
    /// matchmaking pass got there first).
    pub fn try_transition(&self, id: SessionId, from: SessionStatus, to: SessionStatus) -> bool {
        match self.sessions.get_mut(&id) {
            Some(mut session) if session.status == from => {
                session.status = to;
                true
            }
            _ => false,
        }
    }

    pub fn set_room(&self, id: SessionId, room_id: Option<RoomId>) -> Result<(), RegistryError> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(RegistryError::SessionNotFound(id))?;
        session.room_id = room_id;
        Ok(())
    }

    pub fn set_metadata(&self, id: SessionId, key: &str, value: serde_json::Value) {
        if let Some(mut session) = self.sessions.get_mut(&id) {
            session.metadata.insert(key.to_owned(), value);
        }
    }

    /// Refresh the activity timestamp; called after every inbound frame.
    pub fn touch(&self, id: SessionId) {
        if let Some(mut session) = self.sessions.get_mut(&id) {
            session.last_activity = Instant::now();
        }
    }

    pub fn sessions_by_status(&self, status: SessionStatus) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().status == status)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Sessions whose last activity is older than `timeout`. Sessions parked
    /// for reconnection are never idle-evicted; their lifetime is bounded by
    /// room cleanup.
    pub fn collect_idle(&self, timeout: Duration) -> Vec<SessionId> {
        let now = Instant::now();
        self.sessions
            .iter()
            .filter(|entry| {
                let session = entry.value();
                session.status != SessionStatus::WaitingReconnect
                    && now.duration_since(session.last_activity) > timeout
            })
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session counts keyed by status, for logs.
    pub fn stats(&self) -> HashMap<SessionStatus, usize> {
        let mut stats = HashMap::new();
        for entry in self.sessions.iter() {
            *stats.entry(entry.value().status).or_insert(0) += 1;
        }
        stats
    }

    /// Queue an outbound frame for one session. The per-session writer task
    /// is the only socket writer; a dead channel removes the session.
    pub async fn send_to_session(
        &self,
        id: SessionId,
        response: Arc<Response>,
    ) -> Result<(), RegistryError> {
        let (sender, status) = self
            .sessions
            .get(&id)
            .map(|entry| (entry.value().sender.clone(), entry.value().status))
            .ok_or(RegistryError::SessionNotFound(id))?;
        if sender.send(response).await.is_err() {
            // A parked session keeps its record; its lifetime is bounded by
            // room cleanup, not by undeliverable pushes.
            if status == SessionStatus::WaitingReconnect {
                return Err(RegistryError::ChannelClosed(id));
            }
            warn!(session_id = %id, "Writer gone; removing session");
            self.remove(id);
            return Err(RegistryError::ChannelClosed(id));
        }
        Ok(())
    }

    pub async fn send_to_username(
        &self,
        username: &str,
        response: Arc<Response>,
    ) -> Result<(), RegistryError> {
        let session = self
            .by_username(username)
            .ok_or_else(|| RegistryError::UserNotConnected(username.to_owned()))?;
        self.send_to_session(session.id, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::sync::mpsc;

    fn test_session(addr: &str) -> (Session, mpsc::Receiver<Arc<Response>>) {
        let (tx, rx) = mpsc::channel(8);
        let session = Session::new(addr.parse().expect("addr"), tx, SessionGate::new());
        (session, rx)
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new()
    }

    #[tokio::test]
    async fn add_replaces_same_address_session() {
        let reg = registry();
        let (first, _rx1) = test_session("10.0.0.1:4000");
        let first_id = first.id;
        let first_gate = Arc::clone(&first.gate);
        assert!(reg.add(first).is_none());

        let (second, _rx2) = test_session("10.0.0.1:4000");
        let second_id = second.id;
        let displaced = reg.add(second).expect("prior session displaced");
        assert_eq!(displaced.id, first_id);
        assert!(first_gate.is_closed());
        assert_eq!(reg.len(), 1);

        let addr: SocketAddr = "10.0.0.1:4000".parse().expect("addr");
        assert_eq!(reg.by_addr(&addr).expect("addr index").id, second_id);
    }

    #[tokio::test]
    async fn bind_username_enforces_single_session_per_user() {
        let reg = registry();
        let (s1, _rx1) = test_session("10.0.0.1:4000");
        let (s2, _rx2) = test_session("10.0.0.2:4000");
        let (id1, id2) = (s1.id, s2.id);
        reg.add(s1);
        reg.add(s2);

        reg.bind_username(id1, "alice").expect("bind first");
        let displaced = reg
            .bind_username(id2, "alice")
            .expect("bind second")
            .expect("first session displaced");
        assert_eq!(displaced.id, id1);

        // Exactly one username-holding session remains.
        let holders: Vec<_> = [id1, id2]
            .into_iter()
            .filter_map(|id| reg.get(id))
            .filter(|s| s.status.holds_username())
            .collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].id, id2);
        assert_eq!(reg.by_username("alice").expect("lookup").id, id2);
    }

    #[tokio::test]
    async fn rebinding_same_session_is_stable() {
        let reg = registry();
        let (s1, _rx) = test_session("10.0.0.1:4000");
        let id = s1.id;
        reg.add(s1);
        reg.bind_username(id, "alice").expect("bind");
        assert!(reg.bind_username(id, "alice").expect("rebind").is_none());
        assert_eq!(reg.by_username("alice").expect("lookup").id, id);
    }

    #[tokio::test]
    async fn unbind_clears_index_and_status() {
        let reg = registry();
        let (s1, _rx) = test_session("10.0.0.1:4000");
        let id = s1.id;
        reg.add(s1);
        reg.bind_username(id, "alice").expect("bind");

        reg.unbind_username(id);
        assert!(reg.by_username("alice").is_none());
        assert_eq!(reg.get(id).expect("still present").status, SessionStatus::Connected);
    }

    #[tokio::test]
    async fn idle_collection_skips_waiting_reconnect() {
        let reg = registry();
        let (s1, _rx1) = test_session("10.0.0.1:4000");
        let (s2, _rx2) = test_session("10.0.0.2:4000");
        let (id1, id2) = (s1.id, s2.id);
        reg.add(s1);
        reg.add(s2);
        reg.bind_username(id2, "bob").expect("bind");
        reg.set_status(id2, SessionStatus::WaitingReconnect)
            .expect("park");

        // Zero timeout: everything not parked is idle.
        let idle = reg.collect_idle(Duration::ZERO);
        assert_eq!(idle, vec![id1]);
    }

    #[tokio::test]
    async fn touch_resets_idle_clock() {
        let reg = registry();
        let (s1, _rx) = test_session("10.0.0.1:4000");
        let id = s1.id;
        reg.add(s1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(reg.collect_idle(Duration::from_millis(5)).len(), 1);

        reg.touch(id);
        assert!(reg.collect_idle(Duration::from_millis(5)).is_empty());
    }

    #[tokio::test]
    async fn send_routes_through_channel_and_prunes_dead_sessions() {
        let reg = registry();
        let (s1, mut rx) = test_session("10.0.0.1:4000");
        let id = s1.id;
        reg.add(s1);

        let resp = Arc::new(Response {
            code: 1001,
            message: "hi".into(),
            response_key: "welcome".into(),
            data: Value::Null,
        });
        reg.send_to_session(id, Arc::clone(&resp))
            .await
            .expect("send");
        assert_eq!(rx.recv().await.expect("frame").code, 1001);

        // Dropping the receiver kills the writer; the next send prunes.
        drop(rx);
        let err = reg
            .send_to_session(id, resp)
            .await
            .expect_err("dead writer");
        assert!(matches!(err, RegistryError::ChannelClosed(_)));
        assert!(reg.get(id).is_none());
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let reg = registry();
        let (s1, _rx1) = test_session("10.0.0.1:4000");
        let (s2, _rx2) = test_session("10.0.0.2:4000");
        let id1 = s1.id;
        reg.add(s1);
        reg.add(s2);
        reg.bind_username(id1, "alice").expect("bind");

        let stats = reg.stats();
        assert_eq!(stats.get(&SessionStatus::LoggedIn), Some(&1));
        assert_eq!(stats.get(&SessionStatus::Connected), Some(&1));
    }
}
