//! services/api/src/web/rooms.rs
//!
//! Live connection registry. Each connection owns an outbox (`mpsc`) drained
//! by its socket writer task; rooms map a chat id to the connections joined to
//! it. The hub is also the core's `Broadcaster`, so system messages raised
//! outside any connection reach the room the same way relayed messages do.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;
use vet_consult_core::ports::Broadcaster;
use vet_consult_core::view::{ChatView, MessageView};

use crate::web::protocol::{ReceivedMessage, ServerMessage};

const OUTBOX_CAPACITY: usize = 64;

#[derive(Default)]
pub struct RoomHub {
    outboxes: DashMap<Uuid, mpsc::Sender<String>>,
    rooms: DashMap<Uuid, HashSet<Uuid>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns the receiving end of its outbox.
    pub fn register(&self, connection_id: Uuid) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        self.outboxes.insert(connection_id, tx);
        rx
    }

    /// Drops the connection's outbox and removes it from every room.
    pub fn unregister(&self, connection_id: Uuid) {
        self.outboxes.remove(&connection_id);
        self.rooms.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
    }

    pub fn join(&self, chat_id: Uuid, connection_id: Uuid) {
        self.rooms.entry(chat_id).or_default().insert(connection_id);
        debug!(chat_id = %chat_id, connection_id = %connection_id, "Connection joined room.");
    }

    pub fn members(&self, chat_id: Uuid) -> Vec<Uuid> {
        self.rooms
            .get(&chat_id)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Queues a frame for one connection.
    pub fn send_to(&self, connection_id: Uuid, message: &ServerMessage) {
        let outbox = self.outboxes.get(&connection_id).map(|s| s.clone());
        if let Some(outbox) = outbox {
            self.deliver(connection_id, &outbox, message.to_json());
        }
    }

    /// Queues a frame for every connection in the room except `except`.
    pub fn send_to_room(&self, chat_id: Uuid, message: &ServerMessage, except: Option<Uuid>) {
        // Collect first so no map guard is held while delivering.
        let targets: Vec<(Uuid, mpsc::Sender<String>)> = self
            .members(chat_id)
            .into_iter()
            .filter(|id| Some(*id) != except)
            .filter_map(|id| self.outboxes.get(&id).map(|s| (id, s.clone())))
            .collect();

        let frame = message.to_json();
        for (connection_id, outbox) in targets {
            self.deliver(connection_id, &outbox, frame.clone());
        }
    }

    /// Never waits on the connection's socket. A full outbox loses the frame;
    /// a closed one is unregistered.
    fn deliver(&self, connection_id: Uuid, outbox: &mpsc::Sender<String>, frame: String) {
        match outbox.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(connection_id = %connection_id, "Outbox full; dropped frame for a slow connection.");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %connection_id, "Outbox closed; unregistering connection.");
                self.unregister(connection_id);
            }
        }
    }
}

#[async_trait]
impl Broadcaster for RoomHub {
    async fn broadcast_message(
        &self,
        chat_id: Uuid,
        message: MessageView,
        chat: Option<ChatView>,
        except: Option<Uuid>,
    ) {
        let frame = ServerMessage::ReceiveMessage(ReceivedMessage { message, chat });
        self.send_to_room(chat_id, &frame, except);
    }
}
