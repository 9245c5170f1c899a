//! In-memory registry of open real-time connections, keyed by user.
//!
//! Each connection is the sending half of a bounded channel; the transport
//! (SSE) drains the receiving half. Broadcasts never block: a full or closed
//! channel drops the event for that connection only.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::task::{Context, Poll};

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

pub const CONNECTED_EVENT: &str = "connected";
pub const NOTIFICATION_EVENT: &str = "notification";

/// A named, already-serialized event. Cloning shares the payload.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    name: Arc<str>,
    data: Arc<str>,
}

impl StreamEvent {
    pub fn new(name: &str, data: impl Into<Arc<str>>) -> Self {
        Self {
            name: Arc::from(name),
            data: data.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

/// Sending side of one open client stream.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    sender: mpsc::Sender<StreamEvent>,
}

impl Connection {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (sender, receiver) = mpsc::channel(buffer);
        let connection = Self {
            id: Uuid::new_v4(),
            sender,
        };
        (connection, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

type Registry = HashMap<Uuid, HashMap<Uuid, mpsc::Sender<StreamEvent>>>;

#[derive(Clone)]
pub struct StreamHub {
    connections: Arc<RwLock<Registry>>,
    buffer: usize,
}

impl StreamHub {
    /// `buffer` is the per-connection backlog before events are dropped.
    pub fn new(buffer: usize) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    pub fn register(&self, user_id: Uuid, connection: Connection) -> Uuid {
        let connection_id = connection.id;
        self.write()
            .entry(user_id)
            .or_default()
            .insert(connection_id, connection.sender);
        tracing::debug!(user_id = %user_id, connection_id = %connection_id, "stream connection registered");
        connection_id
    }

    /// Removes one connection, dropping the user's entry once it is empty.
    pub fn unregister(&self, user_id: Uuid, connection_id: Uuid) -> bool {
        let mut registry = self.write();
        let Some(set) = registry.get_mut(&user_id) else {
            return false;
        };
        let removed = set.remove(&connection_id).is_some();
        if set.is_empty() {
            registry.remove(&user_id);
        }
        if removed {
            tracing::debug!(user_id = %user_id, connection_id = %connection_id, "stream connection unregistered");
        }
        removed
    }

    /// Sends `payload` to every open connection of `user_id`.
    ///
    /// Returns how many connections accepted the event. Having no connections
    /// is the common case and leaves the registry untouched.
    pub fn broadcast<T: Serialize + ?Sized>(&self, user_id: Uuid, event: &str, payload: &T) -> usize {
        let targets: Vec<(Uuid, mpsc::Sender<StreamEvent>)> = {
            let registry = self.read();
            match registry.get(&user_id) {
                Some(set) if !set.is_empty() => set
                    .iter()
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect(),
                _ => return 0,
            }
        };

        let data = match serde_json::to_string(payload) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(error = ?err, user_id = %user_id, event = event, "failed to serialize stream event");
                return 0;
            }
        };
        let event = StreamEvent::new(event, data);

        let mut delivered = 0;
        for (connection_id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(user_id = %user_id, connection_id = %connection_id, "stream backlog full, dropping event");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(user_id = %user_id, connection_id = %connection_id, "stream already closed");
                }
            }
        }
        delivered
    }

    /// Opens a connection and returns its event stream. Dropping the stream
    /// unregisters the connection.
    pub fn subscribe(&self, user_id: Uuid) -> StreamSubscription {
        let (connection, receiver) = Connection::channel(self.buffer);
        let hello = serde_json::json!({ "connectionId": connection.id });
        // Fresh channel with capacity >= 1
        let _ = connection
            .sender
            .try_send(StreamEvent::new(CONNECTED_EVENT, hello.to_string()));
        let connection_id = self.register(user_id, connection);

        StreamSubscription {
            hub: self.clone(),
            user_id,
            connection_id,
            receiver,
        }
    }

    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.read().get(&user_id).map_or(0, HashMap::len)
    }

    pub fn connected_users(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.connections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.connections.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct StreamSubscription {
    hub: StreamHub,
    user_id: Uuid,
    connection_id: Uuid,
    receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamSubscription {
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }
}

impl Stream for StreamSubscription {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.hub.unregister(self.user_id, self.connection_id);
    }
}
