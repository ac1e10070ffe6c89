//! Live connection set and event fan-out.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::event::ServerEvent;

pub type ConnectionId = Uuid;

/// Frames queued per connection before new ones are dropped.
pub const OUTBOUND_CAPACITY: usize = 64;

/// One realtime channel. Frames pushed here are drained by the socket's writer task.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    identity: Option<String>,
    tx: mpsc::Sender<Arc<str>>,
    dropped: AtomicU64,
}

impl Connection {
    pub fn new(identity: Option<String>) -> (Arc<Self>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let connection = Connection {
            id: Uuid::now_v7(),
            identity,
            tx,
            dropped: AtomicU64::new(0),
        };
        (Arc::new(connection), rx)
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Returns `false` when the queue is full or the writer side is gone.
    pub fn send(&self, frame: Arc<str>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn send_event(&self, event: &ServerEvent) -> bool {
        encode(event).is_some_and(|frame| self.send(frame))
    }

    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn encode(event: &ServerEvent) -> Option<Arc<str>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json.into()),
        Err(e) => {
            warn!(event = event.name(), error = %e, "failed to serialize event");
            None
        }
    }
}

/// Unregister takes the write lock and broadcasts the read lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection: Arc<Connection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id, connection);
    }

    /// Returns whether the connection was registered.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        self.connections.write().await.remove(&id).is_some()
    }

    /// Delivers to every registered connection. Returns how many accepted the frame.
    pub async fn broadcast(&self, event: &ServerEvent) -> usize {
        self.deliver(event, |_| true).await
    }

    /// Delivers only to connections bound to one of `identities`.
    pub async fn broadcast_to(&self, identities: &[&str], event: &ServerEvent) -> usize {
        self.deliver(event, |conn| {
            conn.identity().is_some_and(|id| identities.contains(&id))
        })
        .await
    }

    async fn deliver(&self, event: &ServerEvent, include: impl Fn(&Connection) -> bool) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };

        let conns = self.connections.read().await;
        let mut delivered = 0;
        for conn in conns.values().filter(|c| include(c)) {
            if conn.send(frame.clone()) {
                delivered += 1;
            } else {
                debug!(conn_id = %conn.id, dropped = conn.drop_count(), "connection full or closed, skipping");
            }
        }
        debug!(event = event.name(), delivered, registered = conns.len(), "broadcast");
        delivered
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn identity_connections(&self, identity: &str) -> Vec<ConnectionId> {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.identity() == Some(identity))
            .map(|c| c.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::event::MessagePayload;

    fn event(text: &str) -> ServerEvent {
        ServerEvent::NewMessage(MessagePayload::new("alice", "bob", text))
    }

    fn decode(frame: Arc<str>) -> ServerEvent {
        serde_json::from_str(&frame).unwrap()
    }

    #[tokio::test]
    async fn register_and_unregister() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = Connection::new(None);
        let (c2, _rx2) = Connection::new(Some("alice".into()));
        registry.register(c1.clone()).await;
        registry.register(c2).await;
        assert_eq!(registry.connection_count().await, 2);

        assert!(registry.unregister(c1.id).await);
        assert!(!registry.unregister(c1.id).await);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_registered_connection() {
        let registry = ConnectionRegistry::new();
        let (c1, mut rx1) = Connection::new(None);
        let (c2, mut rx2) = Connection::new(Some("bob".into()));
        registry.register(c1).await;
        registry.register(c2).await;

        assert_eq!(registry.broadcast(&event("hi")).await, 2);
        assert_eq!(decode(rx1.try_recv().unwrap()), event("hi"));
        assert_eq!(decode(rx2.try_recv().unwrap()), event("hi"));
    }

    #[tokio::test]
    async fn unregistered_connection_gets_nothing() {
        let registry = ConnectionRegistry::new();
        let (gone, mut gone_rx) = Connection::new(None);
        let (stays, mut stays_rx) = Connection::new(None);
        registry.register(gone.clone()).await;
        registry.register(stays).await;

        registry.unregister(gone.id).await;
        registry.broadcast(&event("after")).await;

        assert!(gone_rx.try_recv().is_err());
        assert!(stays_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn closed_connection_does_not_fail_broadcast() {
        let registry = ConnectionRegistry::new();
        let (dead, dead_rx) = Connection::new(None);
        let (live, mut live_rx) = Connection::new(None);
        registry.register(dead).await;
        registry.register(live).await;
        drop(dead_rx);

        assert_eq!(registry.broadcast(&event("hi")).await, 1);
        assert!(live_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_to_filters_by_identity() {
        let registry = ConnectionRegistry::new();
        let (alice1, mut a1) = Connection::new(Some("alice".into()));
        let (alice2, mut a2) = Connection::new(Some("alice".into()));
        let (carol, mut c) = Connection::new(Some("carol".into()));
        let (anon, mut n) = Connection::new(None);
        for conn in [alice1, alice2, carol, anon] {
            registry.register(conn).await;
        }

        assert_eq!(registry.broadcast_to(&["alice", "bob"], &event("hi")).await, 2);
        assert!(a1.try_recv().is_ok());
        assert!(a2.try_recv().is_ok());
        assert!(c.try_recv().is_err());
        assert!(n.try_recv().is_err());
        assert_eq!(registry.identity_connections("alice").await.len(), 2);
    }

    #[tokio::test]
    async fn stalled_connection_caps_out_while_others_still_receive() {
        let registry = ConnectionRegistry::new();
        let (stalled, mut stalled_rx) = Connection::new(None);
        let (live, mut live_rx) = Connection::new(None);
        registry.register(stalled.clone()).await;
        registry.register(live).await;

        let overflow = 10;
        for i in 0..OUTBOUND_CAPACITY + overflow {
            let delivered = registry.broadcast(&event(&i.to_string())).await;
            assert_eq!(delivered, if i < OUTBOUND_CAPACITY { 2 } else { 1 });
            assert_eq!(decode(live_rx.try_recv().unwrap()), event(&i.to_string()));
        }

        assert_eq!(stalled.drop_count(), overflow as u64);
        let mut queued = 0;
        while stalled_rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, OUTBOUND_CAPACITY);
    }

    #[tokio::test]
    async fn concurrent_unregister_and_broadcast_never_deliver_after_removal() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();

        for _ in 0..64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let (conn, mut rx) = Connection::new(None);
                registry.register(conn.clone()).await;
                registry.unregister(conn.id).await;
                registry.broadcast(&event("late")).await;
                // Anything received here was sent before our own unregister returned.
                while let Ok(frame) = rx.try_recv() {
                    drop(frame);
                }
                registry.broadcast(&event("later")).await;
                assert!(rx.try_recv().is_err());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.connection_count().await, 0);
    }
}
