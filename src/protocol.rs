//! Wire protocol — inbound commands and outbound events.
//!
//! DESIGN
//! ======
//! Both directions are closed enums. Inbound messages are tagged by `op`
//! and dispatched through one exhaustive `match` in the WS route; outbound
//! events are tagged by `type` and wrapped in a `Frame`.
//!
//! Board ids arrive as strings and are parsed by the dispatcher so that a
//! bad id produces an `Error` event instead of a decode failure. Identifiers
//! inside relay payloads (tasks, columns, users) are opaque strings owned by
//! the external board store and are forwarded untouched.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized task or column DTO supplied by the caller. Passed through.
pub type Snapshot = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDrag {
    pub task_id: String,
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMove {
    pub task_id: String,
    pub from_column_id: String,
    pub to_column_id: String,
    pub new_position: i32,
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDrag {
    pub column_id: String,
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMove {
    pub column_id: String,
    pub new_position: i32,
    pub user_id: String,
    pub display_name: String,
}

/// One row of a board roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: Uuid,
    pub display_name: String,
}

// =============================================================================
// INBOUND
// =============================================================================

/// Client → server operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all_fields = "camelCase")]
pub enum Command {
    JoinBoard { board_id: String },
    LeaveBoard { board_id: String },
    TaskDragStarted { board_id: String, payload: TaskDrag },
    TaskDragEnded { board_id: String, task_id: String },
    TaskMoved { board_id: String, payload: TaskMove },
    ColumnDragStarted { board_id: String, payload: ColumnDrag },
    ColumnDragEnded { board_id: String, column_id: String },
    ColumnMoved { board_id: String, payload: ColumnMove },
    TaskCreated { board_id: String, task: Snapshot },
    TaskUpdated { board_id: String, task: Snapshot },
    TaskDeleted { board_id: String, task_id: String, column_id: String },
    ColumnCreated { board_id: String, column: Snapshot },
    ColumnUpdated { board_id: String, column: Snapshot },
    ColumnDeleted { board_id: String, column_id: String },
    UserStartedEditing { board_id: String, item_type: String, item_id: String },
    UserStoppedEditing { board_id: String, item_type: String, item_id: String },
}

impl Command {
    /// Wire name of the operation, for logs.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::JoinBoard { .. } => "JoinBoard",
            Self::LeaveBoard { .. } => "LeaveBoard",
            Self::TaskDragStarted { .. } => "TaskDragStarted",
            Self::TaskDragEnded { .. } => "TaskDragEnded",
            Self::TaskMoved { .. } => "TaskMoved",
            Self::ColumnDragStarted { .. } => "ColumnDragStarted",
            Self::ColumnDragEnded { .. } => "ColumnDragEnded",
            Self::ColumnMoved { .. } => "ColumnMoved",
            Self::TaskCreated { .. } => "TaskCreated",
            Self::TaskUpdated { .. } => "TaskUpdated",
            Self::TaskDeleted { .. } => "TaskDeleted",
            Self::ColumnCreated { .. } => "ColumnCreated",
            Self::ColumnUpdated { .. } => "ColumnUpdated",
            Self::ColumnDeleted { .. } => "ColumnDeleted",
            Self::UserStartedEditing { .. } => "UserStartedEditing",
            Self::UserStoppedEditing { .. } => "UserStoppedEditing",
        }
    }

    /// The unparsed board id every command carries.
    #[must_use]
    pub fn raw_board_id(&self) -> &str {
        match self {
            Self::JoinBoard { board_id }
            | Self::LeaveBoard { board_id }
            | Self::TaskDragStarted { board_id, .. }
            | Self::TaskDragEnded { board_id, .. }
            | Self::TaskMoved { board_id, .. }
            | Self::ColumnDragStarted { board_id, .. }
            | Self::ColumnDragEnded { board_id, .. }
            | Self::ColumnMoved { board_id, .. }
            | Self::TaskCreated { board_id, .. }
            | Self::TaskUpdated { board_id, .. }
            | Self::TaskDeleted { board_id, .. }
            | Self::ColumnCreated { board_id, .. }
            | Self::ColumnUpdated { board_id, .. }
            | Self::ColumnDeleted { board_id, .. }
            | Self::UserStartedEditing { board_id, .. }
            | Self::UserStoppedEditing { board_id, .. } => board_id,
        }
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Server → client push message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Event {
    /// Sent once after the upgrade completes.
    Connected { connection_id: Uuid, user_id: Uuid, display_name: String },
    /// Join reply to the caller: who was already on the board.
    BoardRoster { users: Vec<PresenceEntry> },
    UserJoinedBoard { user_id: Uuid, display_name: String },
    UserLeftBoard { user_id: Uuid, display_name: String },
    TaskDragStarted(TaskDrag),
    TaskDragEnded { task_id: String },
    TaskMoved(TaskMove),
    ColumnDragStarted(ColumnDrag),
    ColumnDragEnded { column_id: String },
    ColumnMoved(ColumnMove),
    TaskCreated { task: Snapshot },
    TaskUpdated { task: Snapshot },
    TaskDeleted { task_id: String, column_id: String },
    ColumnCreated { column: Snapshot },
    ColumnUpdated { column: Snapshot },
    ColumnDeleted { column_id: String },
    UserStartedEditing { user_id: Uuid, display_name: String, item_type: String, item_id: String },
    UserStoppedEditing { user_id: Uuid, item_type: String, item_id: String },
    /// Caller-only. Never broadcast.
    Error { message: String, code: String, retryable: bool },
}

impl Event {
    /// Wire name of the event, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "Connected",
            Self::BoardRoster { .. } => "BoardRoster",
            Self::UserJoinedBoard { .. } => "UserJoinedBoard",
            Self::UserLeftBoard { .. } => "UserLeftBoard",
            Self::TaskDragStarted(_) => "TaskDragStarted",
            Self::TaskDragEnded { .. } => "TaskDragEnded",
            Self::TaskMoved(_) => "TaskMoved",
            Self::ColumnDragStarted(_) => "ColumnDragStarted",
            Self::ColumnDragEnded { .. } => "ColumnDragEnded",
            Self::ColumnMoved(_) => "ColumnMoved",
            Self::TaskCreated { .. } => "TaskCreated",
            Self::TaskUpdated { .. } => "TaskUpdated",
            Self::TaskDeleted { .. } => "TaskDeleted",
            Self::ColumnCreated { .. } => "ColumnCreated",
            Self::ColumnUpdated { .. } => "ColumnUpdated",
            Self::ColumnDeleted { .. } => "ColumnDeleted",
            Self::UserStartedEditing { .. } => "UserStartedEditing",
            Self::UserStoppedEditing { .. } => "UserStoppedEditing",
            Self::Error { .. } => "Error",
        }
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
