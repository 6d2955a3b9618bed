use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::game::Card;
use crate::protocol::{RoomId, SessionId};

/// What triggered a room-state broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    PlayCard,
    Compose,
    ForcedTurn,
}

/// Every event the bus can carry. Handlers match exhaustively; payloads are
/// one tagged variant per kind instead of loose key/value maps.
#[derive(Debug, Clone)]
pub enum Event {
    /// Enough sessions are ready; the matchmaker should run a pass.
    GameStart,
    CardPlay {
        session_id: SessionId,
        username: String,
        cards: Vec<Card>,
    },
    CardCompose {
        session_id: SessionId,
        username: String,
        room_id: RoomId,
        cards: Vec<Card>,
    },
    ClientDisconnect {
        session_id: SessionId,
        username: Option<String>,
        reason: String,
    },
    ClientReconnect {
        session_id: SessionId,
        username: String,
    },
    /// A newer login supersedes the session; the kick processor finishes
    /// the new session's login.
    ClientKicked {
        session_id: SessionId,
        username: String,
        superseded_by: SessionId,
    },
    GameEnd {
        room_id: RoomId,
        winner: String,
        loser: String,
    },
    GameStateUpdate {
        room_id: RoomId,
        source: UpdateSource,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GameStart,
    CardPlay,
    CardCompose,
    ClientDisconnect,
    ClientReconnect,
    ClientKicked,
    GameEnd,
    GameStateUpdate,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::GameStart => EventKind::GameStart,
            Event::CardPlay { .. } => EventKind::CardPlay,
            Event::CardCompose { .. } => EventKind::CardCompose,
            Event::ClientDisconnect { .. } => EventKind::ClientDisconnect,
            Event::ClientReconnect { .. } => EventKind::ClientReconnect,
            Event::ClientKicked { .. } => EventKind::ClientKicked,
            Event::GameEnd { .. } => EventKind::GameEnd,
            Event::GameStateUpdate { .. } => EventKind::GameStateUpdate,
        }
    }
}

/// A game-logic processor subscribed to one or more event kinds.
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn handle(&self, event: Arc<Event>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    priority: i32,
    handler: Arc<dyn EventHandler>,
}

/// The hub. Within one kind, handlers run in ascending priority. Async
/// delivery schedules each handler on its own task and returns immediately;
/// sync delivery awaits handlers one by one. A panicking handler is caught
/// at the task boundary and logged; it never reaches siblings or the
/// publisher.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        kind: EventKind,
        priority: i32,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.write_subscribers();
        let list = subscribers.entry(kind).or_default();
        list.push(Subscription {
            id,
            priority,
            handler,
        });
        // Stable sort keeps registration order among equal priorities.
        list.sort_by_key(|sub| sub.priority);
        id
    }

    /// Remove a subscription. Idempotent: removing twice reports `false`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.write_subscribers();
        for list in subscribers.values_mut() {
            if let Some(index) = list.iter().position(|sub| sub.id == id) {
                list.remove(index);
                return true;
            }
        }
        false
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.read_subscribers()
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Fire-and-forget delivery: each handler on an independent task, in
    /// ascending-priority spawn order.
    pub fn publish(&self, event: Event) {
        let event = Arc::new(event);
        let handlers = self.snapshot(event.kind());
        if handlers.is_empty() {
            tracing::debug!(kind = ?event.kind(), "No subscribers for event");
            return;
        }
        for (name, handler) in handlers {
            let event = Arc::clone(&event);
            tokio::spawn(async move {
                run_isolated(name, handler, event).await;
            });
        }
    }

    /// Blocking delivery: the publisher waits until every handler returned,
    /// in ascending priority order.
    pub async fn publish_sync(&self, event: Event) {
        let event = Arc::new(event);
        let handlers = self.snapshot(event.kind());
        for (name, handler) in handlers {
            run_isolated(name, handler, Arc::clone(&event)).await;
        }
    }

    fn snapshot(&self, kind: EventKind) -> Vec<(&'static str, Arc<dyn EventHandler>)> {
        self.read_subscribers()
            .get(&kind)
            .map(|list| {
                list.iter()
                    .map(|sub| (sub.handler.name(), Arc::clone(&sub.handler)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn read_subscribers(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<EventKind, Vec<Subscription>>> {
        self.subscribers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_subscribers(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<EventKind, Vec<Subscription>>> {
        self.subscribers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Run one handler on its own task so a panic is confined to that task and
/// surfaced as a join error.
async fn run_isolated(name: &'static str, handler: Arc<dyn EventHandler>, event: Arc<Event>) {
    let kind = event.kind();
    let join = tokio::spawn(async move { handler.handle(event).await });
    if let Err(err) = join.await {
        if err.is_panic() {
            tracing::error!(handler = name, ?kind, "Event handler panicked");
        }
    }
}
