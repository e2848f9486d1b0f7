use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use kind_types::events::GatewayEvent;

/// Routes events to the live connections of specific users.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> (conn_id, sender) for every open connection of that user
    user_channels: RwLock<HashMap<String, Vec<(Uuid, mpsc::UnboundedSender<GatewayEvent>)>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `user_id`. Returns (conn_id, receiver).
    pub async fn register_user_channel(&self, user_id: &str) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push((conn_id, tx));
        (conn_id, rx)
    }

    /// Unregister one connection. Other connections of the same user stay.
    pub async fn unregister_user_channel(&self, user_id: &str, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(conns) = channels.get_mut(user_id) {
            conns.retain(|(id, _)| *id != conn_id);
            if conns.is_empty() {
                channels.remove(user_id);
            }
        }
    }

    /// Send an event to every connection of `user_id`. Offline users are skipped.
    pub async fn send_to_user(&self, user_id: &str, event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        let Some(conns) = channels.get(user_id) else {
            debug!("{} is offline, dropping {} event", user_id, event.kind());
            return;
        };
        for (_, tx) in conns {
            let _ = tx.send(event.clone());
        }
    }

    pub async fn send_to_users(&self, user_ids: &[&str], event: GatewayEvent) {
        for user_id in user_ids {
            self.send_to_user(user_id, event.clone()).await;
        }
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.inner.user_channels.read().await.contains_key(user_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.user_channels.read().await.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_targeted_delivery() {
        let dispatcher = Dispatcher::new();
        let (_, mut boss_rx) = dispatcher.register_user_channel("user_boss").await;
        let (_, mut tao_rx) = dispatcher.register_user_channel("user_tao").await;

        let match_id = Uuid::new_v4();
        dispatcher
            .send_to_user("user_tao", GatewayEvent::MatchDeleted { match_id })
            .await;

        assert!(matches!(tao_rx.try_recv(), Ok(GatewayEvent::MatchDeleted { .. })));
        assert!(boss_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_multiple_connections_per_user() {
        let dispatcher = Dispatcher::new();
        let (phone, mut phone_rx) = dispatcher.register_user_channel("user_tao").await;
        let (_, mut laptop_rx) = dispatcher.register_user_channel("user_tao").await;
        assert_eq!(dispatcher.connection_count().await, 2);

        let event = GatewayEvent::Ready { user_id: "user_tao".into() };
        dispatcher.send_to_users(&["user_tao", "user_nobody"], event).await;
        assert!(phone_rx.try_recv().is_ok());
        assert!(laptop_rx.try_recv().is_ok());

        dispatcher.unregister_user_channel("user_tao", phone).await;
        assert!(dispatcher.is_online("user_tao").await);
        assert_eq!(dispatcher.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_last_connection_goes_offline() {
        let dispatcher = Dispatcher::new();
        let (conn_id, _rx) = dispatcher.register_user_channel("user_boss").await;
        dispatcher.unregister_user_channel("user_boss", Uuid::new_v4()).await;
        assert!(dispatcher.is_online("user_boss").await);
        dispatcher.unregister_user_channel("user_boss", conn_id).await;
        assert!(!dispatcher.is_online("user_boss").await);
    }
}
