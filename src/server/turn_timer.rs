use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::events::{Event, EventBus, UpdateSource};
use crate::game::RoomRegistry;
use crate::protocol::RoomId;

/// One timer per playing room. Expiry swaps the turn under the room lock,
/// re-arms, and publishes a forced state update so the broadcaster emits an
/// 8001-shaped frame with no played cards.
pub struct TurnTimers {
    shared: Arc<TimerShared>,
}

struct TimerShared {
    timers: DashMap<RoomId, (u64, JoinHandle<()>)>,
    generation: AtomicU64,
    duration: Duration,
    bus: Arc<EventBus>,
    rooms: Arc<RoomRegistry>,
}

impl TurnTimers {
    pub fn new(duration: Duration, bus: Arc<EventBus>, rooms: Arc<RoomRegistry>) -> Self {
        Self {
            shared: Arc::new(TimerShared {
                timers: DashMap::new(),
                generation: AtomicU64::new(0),
                duration,
                bus,
                rooms,
            }),
        }
    }

    /// Arm (or re-arm) the room's timer for a full turn duration.
    pub fn restart(&self, room_id: RoomId) {
        TimerShared::arm(Arc::clone(&self.shared), room_id);
    }

    /// Stop the room's timer. A missing timer is a no-op.
    pub fn stop(&self, room_id: RoomId) {
        if let Some((_, (_, handle))) = self.shared.timers.remove(&room_id) {
            handle.abort();
            debug!(%room_id, "Turn timer stopped");
        }
    }

    pub fn active(&self) -> usize {
        self.shared.timers.len()
    }

    pub fn stop_all(&self) {
        let ids: Vec<RoomId> = self.shared.timers.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.stop(id);
        }
    }
}

impl Drop for TurnTimers {
    fn drop(&mut self) {
        self.stop_all();
    }
}

impl TimerShared {
    fn arm(shared: Arc<Self>, room_id: RoomId) {
        let generation = shared.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let task_shared = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(task_shared.duration).await;
            // Only clear the slot if it still belongs to this arming.
            task_shared
                .timers
                .remove_if(&room_id, |_, (slot_gen, _)| *slot_gen == generation);
            task_shared.expire(room_id);
        });
        if let Some((_, old)) = shared.timers.insert(room_id, (generation, handle)) {
            old.abort();
        }
    }

    /// Turn-expiry path. A finished or missing room makes this a no-op.
    fn expire(self: &Arc<Self>, room_id: RoomId) {
        let Some(room) = self.rooms.get(&room_id) else {
            debug!(%room_id, "Timer expired for a missing room");
            return;
        };
        let swapped = room.write().force_turn_end();
        let Some((from, to)) = swapped else {
            debug!(%room_id, "Timer expired but the room is not playing");
            return;
        };
        info!(%room_id, %from, %to, "Turn timed out; turn forced over");
        TimerShared::arm(Arc::clone(self), room_id);
        self.bus.publish(Event::GameStateUpdate {
            room_id,
            source: UpdateSource::ForcedTurn,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventHandler, EventKind};
    use crate::game::RoomStatus;
    use crate::protocol::Round;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::{sleep, timeout};
    use uuid::Uuid;

    struct UpdateCollector {
        seen: Mutex<Vec<UpdateSource>>,
    }

    #[async_trait]
    impl EventHandler for UpdateCollector {
        fn name(&self) -> &'static str {
            "update_collector"
        }

        async fn handle(&self, event: Arc<Event>) {
            if let Event::GameStateUpdate { source, .. } = event.as_ref() {
                self.seen
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push(*source);
            }
        }
    }

    fn playing_room(rooms: &RoomRegistry) -> RoomId {
        let room = rooms.create(10.0, 10);
        {
            let mut st = room.write();
            st.add_player("alice").expect("alice");
            st.add_player("bob").expect("bob");
            st.set_current("alice").expect("first");
            st.status = RoomStatus::Playing;
        }
        room.id
    }

    #[tokio::test]
    async fn stopping_an_absent_timer_is_a_noop() {
        let bus = Arc::new(EventBus::new());
        let rooms = Arc::new(RoomRegistry::new());
        let timers = TurnTimers::new(Duration::from_secs(30), bus, rooms);
        timers.stop(Uuid::new_v4());
        assert_eq!(timers.active(), 0);
    }

    #[tokio::test]
    async fn expiry_swaps_turn_and_rearms() {
        let bus = Arc::new(EventBus::new());
        let collector = Arc::new(UpdateCollector {
            seen: Mutex::new(Vec::new()),
        });
        bus.subscribe(
            EventKind::GameStateUpdate,
            10,
            Arc::clone(&collector) as Arc<dyn EventHandler>,
        );

        let rooms = Arc::new(RoomRegistry::new());
        let room_id = playing_room(&rooms);
        let timers = TurnTimers::new(
            Duration::from_millis(30),
            Arc::clone(&bus),
            Arc::clone(&rooms),
        );
        timers.restart(room_id);

        timeout(Duration::from_secs(2), async {
            loop {
                let fired = !collector
                    .seen
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .is_empty();
                if fired {
                    break;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("forced update published");

        let room = rooms.get(&room_id).expect("room");
        let st = room.read();
        assert_eq!(st.player("bob").expect("bob").round, Round::Current);
        // The timer re-armed for the next turn.
        assert_eq!(timers.active(), 1);
        timers.stop_all();
    }

    #[tokio::test]
    async fn expiry_against_missing_or_finished_room_is_a_noop() {
        let bus = Arc::new(EventBus::new());
        let collector = Arc::new(UpdateCollector {
            seen: Mutex::new(Vec::new()),
        });
        bus.subscribe(
            EventKind::GameStateUpdate,
            10,
            Arc::clone(&collector) as Arc<dyn EventHandler>,
        );

        let rooms = Arc::new(RoomRegistry::new());
        let timers = TurnTimers::new(
            Duration::from_millis(10),
            Arc::clone(&bus),
            Arc::clone(&rooms),
        );

        // Missing room.
        timers.restart(Uuid::new_v4());

        // Finished room.
        let room_id = playing_room(&rooms);
        rooms
            .get(&room_id)
            .expect("room")
            .write()
            .status = RoomStatus::Finished;
        timers.restart(room_id);

        sleep(Duration::from_millis(80)).await;
        assert!(collector
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_empty());
        assert_eq!(timers.active(), 0);
    }

    #[tokio::test]
    async fn restart_replaces_the_previous_timer() {
        let bus = Arc::new(EventBus::new());
        let rooms = Arc::new(RoomRegistry::new());
        let room_id = playing_room(&rooms);
        let timers = TurnTimers::new(Duration::from_secs(60), bus, Arc::clone(&rooms));

        timers.restart(room_id);
        timers.restart(room_id);
        assert_eq!(timers.active(), 1);
        timers.stop(room_id);
        assert_eq!(timers.active(), 0);
    }
}
