//! Group router — per-board broadcast channels over connection senders.
//!
//! DESIGN
//! ======
//! Each live connection registers one bounded `mpsc::Sender<Frame>`; the
//! connection's socket task drains the receiver. A group is the set of
//! connection ids that joined a board (`Board_{board_id}` in logs).
//!
//! Sends are best-effort `try_send`: a full or closed channel is logged and
//! skipped so one slow client never stalls the rest of the board. Senders are
//! snapshotted before sending; no map guard is held while frames go out.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;
use uuid::Uuid;

use crate::frame::Frame;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SendError {
    #[error("connection {0} is not registered")]
    NotConnected(Uuid),
    #[error("outbound buffer full for connection {0}")]
    Full(Uuid),
    #[error("connection {0} closed")]
    Closed(Uuid),
}

/// Outcome of a group send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

/// Logical channel name for a board.
#[must_use]
pub fn group_name(board_id: Uuid) -> String {
    format!("Board_{board_id}")
}

#[derive(Clone, Default)]
pub struct GroupRouter {
    connections: Arc<DashMap<Uuid, mpsc::Sender<Frame>>>,
    groups: Arc<DashMap<Uuid, HashSet<Uuid>>>,
}

impl GroupRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the outbound channel for a newly opened connection.
    pub fn register(&self, connection_id: Uuid, tx: mpsc::Sender<Frame>) {
        self.connections.insert(connection_id, tx);
    }

    /// Forget a closed connection's channel. Group membership is removed
    /// separately by the sweeper.
    pub fn unregister(&self, connection_id: Uuid) {
        self.connections.remove(&connection_id);
    }

    pub fn add_to_group(&self, connection_id: Uuid, board_id: Uuid) {
        self.groups.entry(board_id).or_default().insert(connection_id);
    }

    pub fn remove_from_group(&self, connection_id: Uuid, board_id: Uuid) {
        if let Some(mut members) = self.groups.get_mut(&board_id) {
            members.remove(&connection_id);
        }
        self.groups.remove_if(&board_id, |_, members| members.is_empty());
    }

    #[must_use]
    pub fn is_member(&self, connection_id: Uuid, board_id: Uuid) -> bool {
        self.groups
            .get(&board_id)
            .is_some_and(|members| members.contains(&connection_id))
    }

    #[must_use]
    pub fn members(&self, board_id: Uuid) -> HashSet<Uuid> {
        self.groups
            .get(&board_id)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    /// Send one frame to a single connection.
    ///
    /// # Errors
    ///
    /// Returns a `SendError` if the connection is unknown, its buffer is
    /// full, or its receiver is gone.
    pub fn send_to_connection(&self, connection_id: Uuid, frame: Frame) -> Result<(), SendError> {
        let tx = self
            .connections
            .get(&connection_id)
            .map(|tx| tx.clone())
            .ok_or(SendError::NotConnected(connection_id))?;
        tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full(connection_id),
            TrySendError::Closed(_) => SendError::Closed(connection_id),
        })
    }

    /// Send a frame to every member of the board's group, optionally
    /// excluding one connection. Failures are logged and counted.
    pub fn send_to_group(&self, board_id: Uuid, frame: &Frame, exclude: Option<Uuid>) -> Delivery {
        let targets: Vec<Uuid> = self
            .groups
            .get(&board_id)
            .map(|members| {
                members
                    .iter()
                    .copied()
                    .filter(|id| exclude != Some(*id))
                    .collect()
            })
            .unwrap_or_default();

        let mut delivery = Delivery::default();
        for connection_id in targets {
            match self.send_to_connection(connection_id, frame.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    delivery.failed += 1;
                    warn!(group = %group_name(board_id), event = frame.event.kind(), error = %e, "group: send failed");
                }
            }
        }
        delivery
    }
}

#[cfg(test)]
#[path = "group_test.rs"]
mod tests;
