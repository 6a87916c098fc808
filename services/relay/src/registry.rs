//! Relay Registry
//!
//! Tracks every open connection and fans each inbound message out to all the
//! others. A failed send is treated as a dead peer and unregisters it; it never
//! interrupts delivery to the remaining recipients.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of a single relay connection.
pub type ConnectionId = Uuid;

/// The outbound half of a participant connection.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("Connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}

/// The set of currently open connections.
pub struct RelayRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<dyn Connection>>>,
    /// Membership count, published on every change.
    members: watch::Sender<usize>,
}

impl Default for RelayRegistry {
    fn default() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            members: watch::channel(0).0,
        }
    }
}

impl RelayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection. Registering the same id twice is rejected.
    pub async fn register(
        &self,
        id: ConnectionId,
        connection: Arc<dyn Connection>,
    ) -> Result<(), RelayError> {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&id) {
            return Err(RelayError::AlreadyRegistered(id));
        }
        connections.insert(id, connection);
        self.members.send_replace(connections.len());
        info!(connection_id = %id, total = connections.len(), "Connection registered");
        Ok(())
    }

    /// Removes a connection. Returns `false` if it was not registered.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&id).is_some();
        if removed {
            self.members.send_replace(connections.len());
            info!(connection_id = %id, total = connections.len(), "Connection unregistered");
        }
        removed
    }

    /// Sends `message` to every registered connection except `sender`.
    ///
    /// Delivery runs over a snapshot of the membership taken when the call
    /// starts. Recipients whose send fails are unregistered. Returns how many
    /// recipients received the message.
    pub async fn broadcast(&self, message: &str, sender: ConnectionId) -> usize {
        let recipients: Vec<(ConnectionId, Arc<dyn Connection>)> = self
            .connections
            .read()
            .await
            .iter()
            .filter(|(id, _)| **id != sender)
            .map(|(id, conn)| (*id, conn.clone()))
            .collect();

        let results = join_all(recipients.iter().map(|(id, conn)| async move {
            (*id, conn.send(message).await)
        }))
        .await;

        let mut delivered = 0;
        for (id, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(connection_id = %id, error = %e, "Send failed; dropping recipient");
                    self.unregister(id).await;
                }
            }
        }
        debug!(sender = %sender, delivered, "Broadcast complete");
        delivered
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Resolves once at least `count` connections are registered.
    pub async fn wait_for_len(&self, count: usize) {
        let mut members = self.members.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = members.wait_for(|len| *len >= count).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingConnection {
        received: Mutex<Vec<String>>,
    }

    impl RecordingConnection {
        fn received(&self) -> Vec<String> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        async fn send(&self, text: &str) -> Result<()> {
            self.received.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct ClosedConnection;

    #[async_trait]
    impl Connection for ClosedConnection {
        async fn send(&self, _text: &str) -> Result<()> {
            Err(anyhow!("connection reset"))
        }
    }

    async fn register_recording(
        registry: &RelayRegistry,
    ) -> (ConnectionId, Arc<RecordingConnection>) {
        let id = Uuid::new_v4();
        let conn = Arc::new(RecordingConnection::default());
        registry.register(id, conn.clone()).await.unwrap();
        (id, conn)
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let registry = RelayRegistry::new();
        let (a, conn_a) = register_recording(&registry).await;
        let (_, conn_b) = register_recording(&registry).await;
        let (_, conn_c) = register_recording(&registry).await;

        let delivered = registry.broadcast("hi", a).await;

        assert_eq!(delivered, 2);
        assert!(conn_a.received().is_empty());
        assert_eq!(conn_b.received(), vec!["hi".to_string()]);
        assert_eq!(conn_c.received(), vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn test_broadcast_preserves_per_sender_order() {
        let registry = RelayRegistry::new();
        let (a, _) = register_recording(&registry).await;
        let (_, conn_b) = register_recording(&registry).await;

        for msg in ["one", "two", "three"] {
            registry.broadcast(msg, a).await;
        }
        assert_eq!(conn_b.received(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_failed_recipient_is_unregistered_and_others_still_receive() {
        let registry = RelayRegistry::new();
        let (a, _) = register_recording(&registry).await;
        let dead = Uuid::new_v4();
        registry
            .register(dead, Arc::new(ClosedConnection))
            .await
            .unwrap();
        let (_, conn_c) = register_recording(&registry).await;

        let delivered = registry.broadcast("hello", a).await;

        assert_eq!(delivered, 1);
        assert_eq!(conn_c.received(), vec!["hello".to_string()]);
        assert!(!registry.contains(dead).await);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_unregister_absent_is_noop() {
        let registry = RelayRegistry::new();
        let (a, _) = register_recording(&registry).await;

        assert!(registry.unregister(a).await);
        assert!(!registry.unregister(a).await);
        assert!(!registry.unregister(Uuid::new_v4()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_double_registration_is_rejected() {
        let registry = RelayRegistry::new();
        let (a, _) = register_recording(&registry).await;

        let err = registry
            .register(a, Arc::new(RecordingConnection::default()))
            .await
            .unwrap_err();
        assert_eq!(err, RelayError::AlreadyRegistered(a));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unregistered_connection_stops_receiving() {
        let registry = RelayRegistry::new();
        let (a, _) = register_recording(&registry).await;
        let (b, conn_b) = register_recording(&registry).await;

        registry.broadcast("before", a).await;
        registry.unregister(b).await;
        registry.broadcast("after", a).await;

        assert_eq!(conn_b.received(), vec!["before".to_string()]);
    }

    #[tokio::test]
    async fn test_wait_for_len_resolves_once_peer_joins() {
        let registry = Arc::new(RelayRegistry::new());
        let waiter = tokio::spawn({
            let registry = registry.clone();
            async move { registry.wait_for_len(1).await }
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        register_recording(&registry).await;
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve after registration")
            .unwrap();

        // Already satisfied, so this returns straight away.
        registry.wait_for_len(1).await;
    }

    #[tokio::test]
    async fn test_concurrent_membership_changes_during_broadcast() {
        let registry = Arc::new(RelayRegistry::new());
        let (a, _) = register_recording(&registry).await;
        let (_, stable) = register_recording(&registry).await;

        let churn = tokio::spawn({
            let registry = registry.clone();
            async move {
                for _ in 0..50 {
                    let id = Uuid::new_v4();
                    registry
                        .register(id, Arc::new(RecordingConnection::default()))
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                    registry.unregister(id).await;
                }
            }
        });

        for i in 0..50 {
            registry.broadcast(&format!("m{i}"), a).await;
            tokio::task::yield_now().await;
        }
        churn.await.unwrap();

        let expected: Vec<String> = (0..50).map(|i| format!("m{i}")).collect();
        assert_eq!(stable.received(), expected);
        assert_eq!(registry.len().await, 2);
    }
}
