//! Board session lifecycle — join and leave.
//!
//! DESIGN
//! ======
//! Per board, a connection moves `NotJoined -> Joined -> NotJoined` through
//! `join_board` / `leave_board`, or is swept on disconnect. Join is the only
//! permission-gated transition; once in the group, relay traffic is trusted.
//!
//! Join mutates nothing until the gate has passed, so a denied or failed
//! lookup leaves the registry and the router untouched.
//!
//! ERROR HANDLING
//! ==============
//! Every failure becomes a `HubError` rendered as a caller-only `Error`
//! frame. Broadcast failures are logged by the router and never reach the
//! caller.

use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{ErrorCode, Frame};
use crate::protocol::{Event, PresenceEntry};
use crate::services::permission::{self, Denial, PermissionLevel};
use crate::state::{AppState, Connection};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HubError {
    #[error("invalid board or user identifier: {0}")]
    InvalidId(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("access to board {0} denied")]
    Forbidden(Uuid),
    #[error("could not verify access to board {0}")]
    PermissionUnavailable(Uuid),
    #[error("must join board {0} first")]
    NotJoined(Uuid),
}

impl ErrorCode for HubError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidId(_) => "E_INVALID_ID",
            Self::Malformed(_) => "E_MALFORMED",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::PermissionUnavailable(_) => "E_PERMISSION_UNAVAILABLE",
            Self::NotJoined(_) => "E_NOT_JOINED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::PermissionUnavailable(_))
    }
}

/// Parse a board id supplied by a client.
///
/// # Errors
///
/// Returns `HubError::InvalidId` if `raw` is not a UUID.
pub fn parse_board_id(raw: &str) -> Result<Uuid, HubError> {
    raw.trim()
        .parse()
        .map_err(|_| HubError::InvalidId(raw.to_owned()))
}

// =============================================================================
// JOIN / LEAVE
// =============================================================================

/// Join a board: permission gate, presence insert, group add, then tell the
/// rest of the board. Returns the roster of users already present for the
/// caller.
///
/// Repeat joins are not suppressed: each one re-broadcasts `UserJoinedBoard`.
///
/// # Errors
///
/// Returns `Forbidden` below Viewer and `PermissionUnavailable` when the
/// lookup fails. Nothing is mutated in either case.
pub async fn join_board(
    state: &AppState,
    conn: &mut Connection,
    board_id: Uuid,
) -> Result<Vec<PresenceEntry>, HubError> {
    let user_id = conn.user_id();

    permission::check_minimum(state.permissions.as_ref(), board_id, user_id, PermissionLevel::Viewer)
        .await
        .map_err(|denial| match denial {
            Denial::Insufficient => HubError::Forbidden(board_id),
            Denial::LookupFailed => HubError::PermissionUnavailable(board_id),
        })?;

    let roster = state.presence.join(board_id, user_id, conn.display_name());
    state.groups.add_to_group(conn.id, board_id);
    conn.boards.insert(board_id);

    let joined = Frame::for_board(
        board_id,
        Event::UserJoinedBoard { user_id, display_name: conn.display_name().to_owned() },
    );
    let delivery = state.groups.send_to_group(board_id, &joined, Some(conn.id));

    info!(
        %board_id,
        connection_id = %conn.id,
        %user_id,
        present = roster.len() + 1,
        notified = delivery.delivered,
        "board: user joined"
    );
    Ok(roster)
}

/// Leave a board. Unconditional and idempotent: leaving a board the
/// connection never joined does nothing.
pub fn leave_board(state: &AppState, conn: &mut Connection, board_id: Uuid) {
    if !conn.boards.remove(&board_id) {
        warn!(%board_id, connection_id = %conn.id, "board: leave without join ignored");
        return;
    }

    let user_id = conn.user_id();
    state.presence.leave(board_id, user_id);
    state.groups.remove_from_group(conn.id, board_id);

    let left = Frame::for_board(
        board_id,
        Event::UserLeftBoard { user_id, display_name: conn.display_name().to_owned() },
    );
    let delivery = state.groups.send_to_group(board_id, &left, Some(conn.id));

    info!(%board_id, connection_id = %conn.id, %user_id, notified = delivery.delivered, "board: user left");
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
