use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

use crate::models::ServerMessage;

pub type SessionId = Uuid;

pub fn file_list_room(project_id: &str) -> String {
    format!("project:fileList:{}", project_id)
}

pub fn file_room(project_id: &str, file_id: &str) -> String {
    format!("project-{}:file-{}", project_id, file_id)
}

/// Named broadcast groups of session outboxes.
///
/// Sending never suspends, so a caller that applies an edit and fans it out
/// without awaiting in between delivers room messages in apply order.
#[derive(Default)]
pub struct RoomHub {
    rooms: Mutex<HashMap<String, HashMap<SessionId, UnboundedSender<ServerMessage>>>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<String, HashMap<SessionId, UnboundedSender<ServerMessage>>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn join(&self, room: &str, session: SessionId, outbox: UnboundedSender<ServerMessage>) {
        self.rooms().entry(room.to_string()).or_default().insert(session, outbox);
        debug!("Session {} joined room {}", session, room);
    }

    pub fn leave(&self, room: &str, session: SessionId) {
        let mut rooms = self.rooms();
        if let Some(members) = rooms.get_mut(room) {
            members.remove(&session);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    /// Deliver `msg` to every member of `room` except `except`. Returns the number of recipients.
    pub fn broadcast(&self, room: &str, msg: &ServerMessage, except: Option<SessionId>) -> usize {
        let rooms = self.rooms();
        let Some(members) = rooms.get(room) else {
            return 0;
        };
        let mut delivered = 0;
        for (id, outbox) in members {
            if Some(*id) == except {
                continue;
            }
            // A closed outbox belongs to a session that is tearing down
            if outbox.send(msg.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!("Fanned out to {} sessions in {}", delivered, room);
        delivered
    }

    pub fn members(&self, room: &str) -> usize {
        self.rooms().get(room).map_or(0, HashMap::len)
    }

    pub fn room_count(&self) -> usize {
        self.rooms().len()
    }
}
