use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use uuid::Uuid;

use crate::clients::UserIdentity;
use crate::models::ServerMessage;
use crate::ws::rooms::SessionId;

/// One authenticated connection. Rooms are held by name only; documents
/// belong to the registry and outlive every session.
pub struct Session {
    pub id: SessionId,
    pub user: UserIdentity,
    outbox: UnboundedSender<ServerMessage>,
    rooms: HashSet<String>,
}

impl Session {
    pub fn new(user: UserIdentity, outbox: UnboundedSender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            outbox,
            rooms: HashSet::new(),
        }
    }

    pub fn send(&self, msg: ServerMessage) {
        if self.outbox.send(msg).is_err() {
            warn!("Session {} outbox closed, dropping message", self.id);
        }
    }

    pub fn outbox(&self) -> UnboundedSender<ServerMessage> {
        self.outbox.clone()
    }

    pub(crate) fn remember_room(&mut self, room: String) {
        self.rooms.insert(room);
    }

    pub fn rooms(&self) -> impl Iterator<Item = &String> {
        self.rooms.iter()
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.rooms.contains(room)
    }
}
