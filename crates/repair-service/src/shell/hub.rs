// Process-wide status hub: per-user connection sets, broadcast on status
// change.
//
// Responsibilities
// - One mutex guards the map. Broadcast snapshots the per-user senders
//   under the lock and writes outside it; a failed write prunes that
//   connection.
// - No replay: a connection only sees updates broadcast while it is
//   registered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(rename = "repairID")]
    pub repair_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub status: String,
}

pub type ConnectionId = u64;

#[derive(Clone)]
struct Connection {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
pub struct StatusHub {
    next_id: AtomicU64,
    clients: Mutex<HashMap<String, Vec<Connection>>>,
}

impl StatusHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: &str, sender: mpsc::UnboundedSender<String>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut clients = self.lock_clients();
        clients
            .entry(user_id.to_string())
            .or_default()
            .push(Connection { id, sender });
        tracing::debug!(user_id, connection = id, "registered websocket client");
        id
    }

    pub fn unregister(&self, user_id: &str, connection_id: ConnectionId) {
        let mut clients = self.lock_clients();
        if let Some(connections) = clients.get_mut(user_id) {
            connections.retain(|connection| connection.id != connection_id);
            if connections.is_empty() {
                clients.remove(user_id);
            }
        }
    }

    /// Sends the JSON-encoded update to every connection of the update's
    /// user. Write failures are absorbed: the connection is dropped from
    /// the map and everyone else still receives the frame.
    pub fn broadcast(&self, update: &StatusUpdate) {
        let frame = match serde_json::to_string(update) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode status update");
                return;
            }
        };
        let targets: Vec<Connection> = {
            let clients = self.lock_clients();
            clients.get(&update.user_id).cloned().unwrap_or_default()
        };
        for connection in targets {
            if connection.sender.send(frame.clone()).is_err() {
                self.unregister(&update.user_id, connection.id);
                tracing::debug!(
                    user_id = %update.user_id,
                    connection = connection.id,
                    "pruned closed websocket client"
                );
            }
        }
    }

    fn lock_clients(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Connection>>> {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod status_hub_tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn update() -> StatusUpdate {
        StatusUpdate {
            repair_id: "r1".into(),
            user_id: "u1".into(),
            status: "completed".into(),
        }
    }

    #[rstest]
    fn it_should_broadcast_to_every_connection_of_the_user(update: StatusUpdate) {
        let hub = StatusHub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        hub.register("u1", tx_a);
        hub.register("u1", tx_b);

        hub.broadcast(&update);

        let frame = rx_a.try_recv().unwrap();
        assert_eq!(frame, rx_b.try_recv().unwrap());
        let decoded: StatusUpdate = serde_json::from_str(&frame).unwrap();
        assert_eq!(decoded, update);
        assert!(frame.contains("\"repairID\""));
    }

    #[rstest]
    fn it_should_not_cross_users(update: StatusUpdate) {
        let hub = StatusHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register("u2", tx);

        hub.broadcast(&update);
        assert!(rx.try_recv().is_err());
    }

    #[rstest]
    fn it_should_preserve_broadcast_order_per_connection(update: StatusUpdate) {
        let hub = StatusHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register("u1", tx);

        hub.broadcast(&update);
        let mut second = update.clone();
        second.status = "cancelled".into();
        hub.broadcast(&second);

        let first: StatusUpdate = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        let next: StatusUpdate = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(first.status, "completed");
        assert_eq!(next.status, "cancelled");
    }

    #[rstest]
    fn it_should_prune_a_closed_connection_on_broadcast(update: StatusUpdate) {
        let hub = StatusHub::new();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        hub.register("u1", tx_dead);
        hub.register("u1", tx_live);
        drop(rx_dead);

        hub.broadcast(&update);
        assert!(rx_live.try_recv().is_ok());

        // Second broadcast only touches the surviving connection.
        hub.broadcast(&update);
        assert!(rx_live.try_recv().is_ok());
        assert_eq!(hub.lock_clients().get("u1").map(Vec::len), Some(1));
    }

    #[rstest]
    fn it_should_remove_the_user_entry_after_unregister(update: StatusUpdate) {
        let hub = StatusHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register("u1", tx);
        hub.unregister("u1", id);

        hub.broadcast(&update);
        assert!(rx.try_recv().is_err());
        assert!(hub.lock_clients().get("u1").is_none());
    }
}
