//! Connected observer registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use attn_core::{ClientId, ServerMessage, SubjectId};
use dashmap::DashMap;
use tokio::sync::mpsc;

/// What an observer is currently looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    Dashboard,
    ProfileViewing(SubjectId),
}

#[derive(Debug)]
struct ClientEntry {
    tx: mpsc::Sender<ServerMessage>,
    mode: ClientMode,
}

/// Set of connected observers and their outbound queues.
///
/// Each client owns a bounded queue; the connection layer drains it into the
/// socket. A closed queue means the connection is gone.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    clients: Arc<DashMap<ClientId, ClientEntry>>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl ClientRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new observer in dashboard mode.
    ///
    /// Returns its id and the receiving end of its outbound queue.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = ClientId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.clients.insert(
            id,
            ClientEntry {
                tx,
                mode: ClientMode::Dashboard,
            },
        );
        (id, rx)
    }

    /// Remove an observer. Returns false if it was already gone.
    pub fn remove(&self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn sender(&self, id: ClientId) -> Option<mpsc::Sender<ServerMessage>> {
        self.clients.get(&id).map(|entry| entry.tx.clone())
    }

    pub fn mode(&self, id: ClientId) -> Option<ClientMode> {
        self.clients.get(&id).map(|entry| entry.mode)
    }

    /// Set the mode of a connected observer. Returns false if unknown.
    pub fn set_mode(&self, id: ClientId, mode: ClientMode) -> bool {
        match self.clients.get_mut(&id) {
            Some(mut entry) => {
                entry.mode = mode;
                true
            }
            None => false,
        }
    }

    /// Clients currently viewing the profile of `subject`.
    pub fn viewers_of(&self, subject: SubjectId) -> Vec<ClientId> {
        self.clients
            .iter()
            .filter(|entry| entry.mode == ClientMode::ProfileViewing(subject))
            .map(|entry| *entry.key())
            .collect()
    }

    /// Snapshot of every outbound queue, so delivery never holds a map shard.
    pub fn senders(&self) -> Vec<(ClientId, mpsc::Sender<ServerMessage>)> {
        self.clients
            .iter()
            .map(|entry| (*entry.key(), entry.tx.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
