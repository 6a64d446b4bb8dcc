//! Frame — the outbound envelope for every server push.
//!
//! ARCHITECTURE
//! ============
//! Every message the hub writes to a socket is a `Frame`: a fresh id, a
//! timestamp, the board it concerns (absent for connection-level events),
//! and one typed `Event`. Peers receive the same frame the originating
//! client would have, minus any echo to the originator.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::Event;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub id: Uuid,
    /// Milliseconds since Unix epoch. Set automatically at construction.
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<Uuid>,
    pub event: Event,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    #[must_use]
    pub fn new(event: Event) -> Self {
        Self { id: Uuid::new_v4(), ts: now_ms(), board_id: None, event }
    }

    /// Frame addressed to a board channel.
    #[must_use]
    pub fn for_board(board_id: Uuid, event: Event) -> Self {
        Self::new(event).with_board_id(board_id)
    }

    /// Create a structured error frame from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::new(Event::Error {
            message: err.to_string(),
            code: err.error_code().to_owned(),
            retryable: err.retryable(),
        })
    }

    #[must_use]
    pub fn with_board_id(mut self, board_id: Uuid) -> Self {
        self.board_id = Some(board_id);
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_fields() {
        let frame = Frame::new(Event::BoardRoster { users: Vec::new() });
        assert!(frame.board_id.is_none());
        assert!(frame.ts > 0);
        assert!(!matches!(frame.event, Event::Error { .. }));
    }

    #[test]
    fn for_board_sets_board_id() {
        let board_id = Uuid::new_v4();
        let frame = Frame::for_board(board_id, Event::ColumnDeleted { column_id: "c1".into() });
        assert_eq!(frame.board_id, Some(board_id));
    }

    #[test]
    fn json_round_trip() {
        let board_id = Uuid::new_v4();
        let original = Frame::for_board(board_id, Event::TaskDragEnded { task_id: "t1".into() });

        let json = serde_json::to_string(&original).expect("serialize");
        assert!(json.contains("\"boardId\""));
        let restored: Frame = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(restored, original);
    }

    #[test]
    fn board_id_omitted_when_absent() {
        let frame = Frame::new(Event::BoardRoster { users: Vec::new() });
        let value = serde_json::to_value(&frame).unwrap();
        assert!(value.get("boardId").is_none());
    }

    #[test]
    fn error_from_typed() {
        #[derive(Debug, thiserror::Error)]
        #[error("not found")]
        struct NotFound;

        impl ErrorCode for NotFound {
            fn error_code(&self) -> &'static str {
                "E_NOT_FOUND"
            }
        }

        let frame = Frame::error_from(&NotFound);
        assert_eq!(
            frame.event,
            Event::Error { message: "not found".into(), code: "E_NOT_FOUND".into(), retryable: false }
        );
    }
}
