use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use pigeon_types::events::GatewayEvent;

type ConnectionMap = HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>;

/// Tracks connected clients and routes events to the users they concern.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> (conn_id -> sender). A user may be connected from several devices.
    user_channels: RwLock<HashMap<Uuid, ConnectionMap>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a targeted channel for one connection. Returns (conn_id, receiver).
    pub async fn register_user_channel(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(conns) = channels.get_mut(&user_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    /// Send an event to every connection of `user_id`. Offline users are skipped.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some(conns) = channels.get(&user_id) {
            for tx in conns.values() {
                let _ = tx.send(event.clone());
            }
        }
    }

    pub async fn send_to_users<I>(&self, user_ids: I, event: GatewayEvent)
    where
        I: IntoIterator<Item = Uuid>,
    {
        let channels = self.inner.user_channels.read().await;
        for user_id in user_ids {
            if let Some(conns) = channels.get(&user_id) {
                for tx in conns.values() {
                    let _ = tx.send(event.clone());
                }
            }
        }
    }

    /// Number of live connections for `user_id`.
    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        self.inner
            .user_channels
            .read()
            .await
            .get(&user_id)
            .map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(user_id: Uuid) -> GatewayEvent {
        GatewayEvent::Ready {
            user_id,
            username: "alice".into(),
        }
    }

    #[tokio::test]
    async fn every_connection_of_a_user_receives_the_event() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let (_, mut phone) = dispatcher.register_user_channel(alice).await;
        let (_, mut laptop) = dispatcher.register_user_channel(alice).await;
        assert_eq!(dispatcher.connection_count(alice).await, 2);

        dispatcher.send_to_user(alice, ready(alice)).await;

        assert!(matches!(phone.recv().await, Some(GatewayEvent::Ready { .. })));
        assert!(matches!(laptop.recv().await, Some(GatewayEvent::Ready { .. })));
    }

    #[tokio::test]
    async fn unregistered_connection_stops_receiving() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (conn_id, mut rx) = dispatcher.register_user_channel(alice).await;
        let (_, mut bob_rx) = dispatcher.register_user_channel(bob).await;

        dispatcher.unregister_user_channel(alice, conn_id).await;
        assert_eq!(dispatcher.connection_count(alice).await, 0);

        dispatcher.send_to_users([alice, bob], ready(alice)).await;
        assert!(bob_rx.recv().await.is_some());
        // The sender side was dropped on unregister, so the stream is closed.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn offline_users_are_ignored() {
        let dispatcher = Dispatcher::new();
        dispatcher.send_to_user(Uuid::new_v4(), ready(Uuid::new_v4())).await;
    }
}
