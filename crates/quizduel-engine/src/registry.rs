//! Live-connection registry: one outbound channel per online user.
//!
//! The registry owns nothing but the sending half of each connection's
//! event channel; the transport side drains the receiving half. Delivery is
//! best-effort: a dead channel is reported to the caller, who runs the same
//! path as an explicit disconnect.
//!
//! Each registration gets an epoch number. A connection handler that
//! unregisters must present the epoch it was given, so a superseded handler
//! shutting down late cannot evict the user's newer connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use quizduel_protocol::{ServerEvent, UserId};

/// Sending half of a connection's outbound event channel.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Result of a best-effort send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The event was handed to the connection's writer.
    Delivered,
    /// The user has no registered connection; nothing was sent.
    Offline,
    /// The user's channel is dead; the entry was removed. The caller should
    /// treat this like a disconnect.
    Dead,
}

struct Entry {
    epoch: u64,
    sender: EventSender,
}

/// Tracks the single live connection of every online user.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<UserId, Entry>>,
    next_epoch: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_epoch: AtomicU64::new(1),
        }
    }

    /// Registers a user's connection, replacing any previous one, and
    /// returns the registration epoch.
    ///
    /// Replacing drops the old sender, which ends the old writer task.
    pub async fn register(&self, user: UserId, sender: EventSender) -> u64 {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .connections
            .lock()
            .await
            .insert(user, Entry { epoch, sender });
        if previous.is_some() {
            tracing::debug!(%user, "connection replaced by a newer one");
        }
        epoch
    }

    /// Removes a user's connection.
    ///
    /// With `epoch: Some(..)` the entry is only removed if it still belongs
    /// to that registration; a stale handler's unregister is a no-op.
    /// Returns whether an entry was removed.
    pub async fn unregister(&self, user: UserId, epoch: Option<u64>) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.get(&user) {
            Some(entry) if epoch.is_none() || epoch == Some(entry.epoch) => {
                connections.remove(&user);
                true
            }
            _ => false,
        }
    }

    /// Whether the user currently has a registered connection.
    pub async fn is_online(&self, user: UserId) -> bool {
        self.connections.lock().await.contains_key(&user)
    }

    /// Best-effort send. A dead channel unregisters the user and reports
    /// [`SendOutcome::Dead`].
    pub async fn send(&self, user: UserId, event: ServerEvent) -> SendOutcome {
        let mut connections = self.connections.lock().await;
        let Some(entry) = connections.get(&user) else {
            return SendOutcome::Offline;
        };
        if entry.sender.send(event).is_ok() {
            SendOutcome::Delivered
        } else {
            connections.remove(&user);
            SendOutcome::Dead
        }
    }

    /// Number of online users.
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
