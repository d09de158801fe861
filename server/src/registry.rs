use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::game::Room;

pub type SharedRoom = Arc<Mutex<Room>>;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room id '{0}' is already taken. Please pick another id.")]
    DuplicateRoom(String),
    #[error("Room '{0}' not found.")]
    RoomNotFound(String),
    #[error("Room is already full.")]
    RoomFull,
    #[error("Game has already started.")]
    GameAlreadyStarted,
    #[error("Werewolf count must be at least 1 and below the room capacity.")]
    BadWerewolfCount,
    #[error("You are already in a room.")]
    AlreadyInRoom,
}

/// Owns the id -> room mapping. The map lock covers only create/get/destroy;
/// each room carries its own mutex, so actions in different rooms never
/// contend with each other.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, SharedRoom>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        id: &str,
        capacity: usize,
        werewolf_count: usize,
    ) -> Result<SharedRoom, RoomError> {
        if werewolf_count == 0 || werewolf_count >= capacity {
            return Err(RoomError::BadWerewolfCount);
        }
        let mut rooms = self.rooms.lock();
        if rooms.contains_key(id) {
            return Err(RoomError::DuplicateRoom(id.to_string()));
        }
        let room = Arc::new(Mutex::new(Room::new(id.to_string(), capacity, werewolf_count)));
        rooms.insert(id.to_string(), room.clone());
        Ok(room)
    }

    pub fn get(&self, id: &str) -> Result<SharedRoom, RoomError> {
        self.rooms
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| RoomError::RoomNotFound(id.to_string()))
    }

    /// Removes the room once its last player is gone. Idempotent; a room
    /// that is absent or still occupied is left alone.
    pub fn destroy_if_empty(&self, id: &str) -> bool {
        let mut rooms = self.rooms.lock();
        let empty = match rooms.get(id) {
            Some(room) => room.lock().is_empty(),
            None => return false,
        };
        if empty {
            rooms.remove(id);
        }
        empty
    }

    pub fn len(&self) -> usize {
        self.rooms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.lock().is_empty()
    }
}
