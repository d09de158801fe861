use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;
use werewolf_protocol::ServerToClient;

use crate::game::Room;

/// Outbound half of the session layer: connection id -> sender. A send to a
/// vanished connection is dropped silently; game state never depends on a
/// socket still being alive.
#[derive(Default)]
pub struct Connections {
    senders: Mutex<HashMap<Uuid, UnboundedSender<ServerToClient>>>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: Uuid, tx: UnboundedSender<ServerToClient>) {
        self.senders.lock().insert(conn, tx);
    }

    pub fn unregister(&self, conn: Uuid) {
        self.senders.lock().remove(&conn);
    }

    pub fn send(&self, conn: Uuid, msg: ServerToClient) {
        let senders = self.senders.lock();
        if let Some(tx) = senders.get(&conn) {
            if tx.send(msg).is_err() {
                debug!(conn = %conn, "send to closed connection dropped");
            }
        }
    }

    /// Delivers `msg` to every connection currently seated in `room`.
    pub fn broadcast(&self, room: &Room, msg: ServerToClient) {
        let senders = self.senders.lock();
        for player in &room.players {
            if let Some(tx) = senders.get(&player.conn) {
                if tx.send(msg.clone()).is_err() {
                    debug!(conn = %player.conn, "broadcast to closed connection dropped");
                }
            }
        }
    }
}
