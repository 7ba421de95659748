//! Delivery of outbound messages to addressed connections

use crate::domain::ConnectionId;
use crate::relay::messages::OutboundMessage;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Outcome of a failed send
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The connection no longer exists; never retried
    #[error("connection is gone")]
    Gone,

    /// Delivery failed for now; the relay does not retry either
    #[error("transient delivery failure: {0}")]
    Transient(String),
}

/// Addressed delivery to a long-lived client connection
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    async fn send(
        &self,
        connection_id: &ConnectionId,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError>;
}

/// In-process connection table used by the WebSocket gateway
///
/// Each registered connection owns the receiving half of a bounded channel;
/// the gateway drains it into the socket.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<OutboundMessage>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection_id` and return its outbound queue
    pub fn register(
        &self,
        connection_id: ConnectionId,
        capacity: usize,
    ) -> mpsc::Receiver<OutboundMessage> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        self.connections.write().insert(connection_id, sender);
        receiver
    }

    pub fn unregister(&self, connection_id: &ConnectionId) -> bool {
        self.connections.write().remove(connection_id).is_some()
    }

    pub fn is_registered(&self, connection_id: &ConnectionId) -> bool {
        self.connections.read().contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

#[async_trait]
impl ConnectionSink for ConnectionRegistry {
    async fn send(
        &self,
        connection_id: &ConnectionId,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        let sender = self
            .connections
            .read()
            .get(connection_id)
            .cloned()
            .ok_or(DeliveryError::Gone)?;

        // Waits while the queue is full; the caller bounds the wait.
        sender.send(message.clone()).await.map_err(|_| {
            debug!(connection_id = %connection_id, "dropping closed connection");
            self.connections.write().remove(connection_id);
            DeliveryError::Gone
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn connection(id: &str) -> ConnectionId {
        ConnectionId::try_new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_registered_connection_receives_messages_in_order() {
        let registry = ConnectionRegistry::new();
        let mut outbound = registry.register(connection("c1"), 8);

        registry
            .send(&connection("c1"), &OutboundMessage::ai_chunk("a", 0))
            .await
            .unwrap();
        registry
            .send(&connection("c1"), &OutboundMessage::ai_chunk("b", 1))
            .await
            .unwrap();

        assert_eq!(outbound.recv().await, Some(OutboundMessage::ai_chunk("a", 0)));
        assert_eq!(outbound.recv().await, Some(OutboundMessage::ai_chunk("b", 1)));
    }

    #[tokio::test]
    async fn test_unknown_connection_is_gone() {
        let registry = ConnectionRegistry::new();
        let result = registry
            .send(&connection("nobody"), &OutboundMessage::error("x"))
            .await;
        assert_eq!(result, Err(DeliveryError::Gone));
    }

    #[tokio::test]
    async fn test_closed_connection_is_gone_and_forgotten() {
        let registry = ConnectionRegistry::new();
        let outbound = registry.register(connection("c1"), 8);
        drop(outbound);

        let result = registry
            .send(&connection("c1"), &OutboundMessage::error("x"))
            .await;

        assert_eq!(result, Err(DeliveryError::Gone));
        assert!(!registry.is_registered(&connection("c1")));
    }

    #[tokio::test]
    async fn test_full_queue_waits_for_the_reader() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut outbound = registry.register(connection("c1"), 1);

        registry
            .send(&connection("c1"), &OutboundMessage::ai_chunk("a", 0))
            .await
            .unwrap();

        let pending = tokio::spawn({
            let registry = registry.clone();
            async move {
                registry
                    .send(&connection("c1"), &OutboundMessage::ai_chunk("b", 1))
                    .await
            }
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        assert_eq!(outbound.recv().await, Some(OutboundMessage::ai_chunk("a", 0)));
        assert_eq!(pending.await.unwrap(), Ok(()));
        assert_eq!(outbound.recv().await, Some(OutboundMessage::ai_chunk("b", 1)));
    }

    #[tokio::test]
    async fn test_reader_dropped_while_waiting_is_gone() {
        let registry = Arc::new(ConnectionRegistry::new());
        let outbound = registry.register(connection("c1"), 1);

        registry
            .send(&connection("c1"), &OutboundMessage::ai_chunk("a", 0))
            .await
            .unwrap();
        let pending = tokio::spawn({
            let registry = registry.clone();
            async move {
                registry
                    .send(&connection("c1"), &OutboundMessage::ai_chunk("b", 1))
                    .await
            }
        });
        tokio::task::yield_now().await;
        drop(outbound);

        assert_eq!(pending.await.unwrap(), Err(DeliveryError::Gone));
        assert!(!registry.is_registered(&connection("c1")));
    }

    #[test]
    fn test_unregister_removes_connection() {
        let registry = ConnectionRegistry::new();
        let _outbound = registry.register(connection("c1"), 4);

        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(&connection("c1")));
        assert!(registry.is_empty());
    }
}
