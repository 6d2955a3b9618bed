use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::game::room::Room;
use crate::protocol::RoomId;

/// All live rooms, indexed by id. Rooms are created by the matchmaker and
/// removed by the end-of-game processor.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, initial_health: f64, max_hand_cards: usize) -> Arc<Room> {
        let id = Uuid::new_v4();
        let room = Arc::new(Room::new(id, initial_health, max_hand_cards));
        self.rooms.insert(id, Arc::clone(&room));
        room
    }

    pub fn get(&self, id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.remove(id).map(|(_, room)| room)
    }

    /// Room containing the given player, if any. Resolution goes through the
    /// registry on demand; rooms never hold session references.
    pub fn find_by_player(&self, username: &str) -> Option<Arc<Room>> {
        self.rooms
            .iter()
            .find(|entry| entry.value().read().player(username).is_some())
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_remove_roundtrip() {
        let registry = RoomRegistry::new();
        let room = registry.create(10.0, 10);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&room.id).is_some());

        registry.remove(&room.id);
        assert!(registry.get(&room.id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn find_by_player_scans_rooms() {
        let registry = RoomRegistry::new();
        let room = registry.create(10.0, 10);
        room.write().add_player("alice").expect("add");

        let found = registry.find_by_player("alice").expect("room for alice");
        assert_eq!(found.id, room.id);
        assert!(registry.find_by_player("nobody").is_none());
    }
}
