//! Disconnect sweeper — presence and group cleanup when a socket closes.
//!
//! Runs once per closed connection. Presence is removed by user id on every
//! board the registry lists for that user, and each of those boards hears a
//! `UserLeftBoard`. Group membership is dropped for every board the
//! connection itself joined. A failed notification on one board is logged
//! and the sweep moves on.

use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::Frame;
use crate::protocol::Event;
use crate::services::group::group_name;
use crate::state::{AppState, Connection};

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Boards the user was removed from, in board id order.
    pub boards: Vec<Uuid>,
    /// Boards where the leave notification missed at least one peer.
    pub failed_notifications: usize,
}

pub fn sweep_disconnect(state: &AppState, conn: &Connection) -> SweepReport {
    let user_id = conn.user_id();
    let departures = state.presence.remove_user_everywhere(user_id);

    for board_id in &conn.boards {
        state.groups.remove_from_group(conn.id, *board_id);
    }

    let mut report = SweepReport::default();
    for departure in departures {
        let board_id = departure.board_id;
        let left = Frame::for_board(
            board_id,
            Event::UserLeftBoard { user_id, display_name: departure.display_name },
        );
        let delivery = state.groups.send_to_group(board_id, &left, Some(conn.id));
        if delivery.failed > 0 {
            report.failed_notifications += 1;
            warn!(group = %group_name(board_id), %user_id, failed = delivery.failed, "sweep: leave notification partially failed");
        }
        report.boards.push(board_id);
    }

    info!(connection_id = %conn.id, %user_id, boards = report.boards.len(), "sweep: connection cleaned up");
    report
}

#[cfg(test)]
#[path = "sweeper_test.rs"]
mod tests;
