//! Event broadcaster — typed relays for drag choreography, CRUD
//! notifications and editing focus.
//!
//! DESIGN
//! ======
//! One function per event kind. Each checks that the caller is in the
//! board's group, checks that identifier fields are present, and forwards
//! the payload unchanged to every other member. The hub does not interpret
//! positions, column ids or snapshots; the board store is authoritative and
//! clients render last-write-wins.

use tracing::debug;
use uuid::Uuid;

use crate::frame::Frame;
use crate::protocol::{ColumnDrag, ColumnMove, Event, Snapshot, TaskDrag, TaskMove};
use crate::services::board::HubError;
use crate::services::group::Delivery;
use crate::state::{AppState, Connection};

// =============================================================================
// DRAG CHOREOGRAPHY
// =============================================================================

/// # Errors
///
/// `NotJoined` if the caller is not in the board's group, `Malformed` if an
/// identifier is empty. Same for every relay below.
pub fn task_drag_started(state: &AppState, conn: &Connection, board_id: Uuid, drag: TaskDrag) -> Result<Delivery, HubError> {
    require(&[("taskId", &drag.task_id), ("userId", &drag.user_id)])?;
    relay(state, conn, board_id, Event::TaskDragStarted(drag))
}

/// # Errors
///
/// See [`task_drag_started`].
pub fn task_drag_ended(state: &AppState, conn: &Connection, board_id: Uuid, task_id: String) -> Result<Delivery, HubError> {
    require(&[("taskId", &task_id)])?;
    relay(state, conn, board_id, Event::TaskDragEnded { task_id })
}

/// # Errors
///
/// See [`task_drag_started`].
pub fn task_moved(state: &AppState, conn: &Connection, board_id: Uuid, movement: TaskMove) -> Result<Delivery, HubError> {
    require(&[
        ("taskId", &movement.task_id),
        ("fromColumnId", &movement.from_column_id),
        ("toColumnId", &movement.to_column_id),
        ("userId", &movement.user_id),
    ])?;
    relay(state, conn, board_id, Event::TaskMoved(movement))
}

/// # Errors
///
/// See [`task_drag_started`].
pub fn column_drag_started(
    state: &AppState,
    conn: &Connection,
    board_id: Uuid,
    drag: ColumnDrag,
) -> Result<Delivery, HubError> {
    require(&[("columnId", &drag.column_id), ("userId", &drag.user_id)])?;
    relay(state, conn, board_id, Event::ColumnDragStarted(drag))
}

/// # Errors
///
/// See [`task_drag_started`].
pub fn column_drag_ended(
    state: &AppState,
    conn: &Connection,
    board_id: Uuid,
    column_id: String,
) -> Result<Delivery, HubError> {
    require(&[("columnId", &column_id)])?;
    relay(state, conn, board_id, Event::ColumnDragEnded { column_id })
}

/// # Errors
///
/// See [`task_drag_started`].
pub fn column_moved(
    state: &AppState,
    conn: &Connection,
    board_id: Uuid,
    movement: ColumnMove,
) -> Result<Delivery, HubError> {
    require(&[("columnId", &movement.column_id), ("userId", &movement.user_id)])?;
    relay(state, conn, board_id, Event::ColumnMoved(movement))
}

// =============================================================================
// CRUD NOTIFICATIONS
// =============================================================================

/// # Errors
///
/// See [`task_drag_started`]; an empty snapshot is `Malformed`.
pub fn task_created(state: &AppState, conn: &Connection, board_id: Uuid, task: Snapshot) -> Result<Delivery, HubError> {
    require_snapshot("task", &task)?;
    relay(state, conn, board_id, Event::TaskCreated { task })
}

/// # Errors
///
/// See [`task_created`].
pub fn task_updated(state: &AppState, conn: &Connection, board_id: Uuid, task: Snapshot) -> Result<Delivery, HubError> {
    require_snapshot("task", &task)?;
    relay(state, conn, board_id, Event::TaskUpdated { task })
}

/// # Errors
///
/// See [`task_drag_started`].
pub fn task_deleted(
    state: &AppState,
    conn: &Connection,
    board_id: Uuid,
    task_id: String,
    column_id: String,
) -> Result<Delivery, HubError> {
    require(&[("taskId", &task_id), ("columnId", &column_id)])?;
    relay(state, conn, board_id, Event::TaskDeleted { task_id, column_id })
}

/// # Errors
///
/// See [`task_created`].
pub fn column_created(state: &AppState, conn: &Connection, board_id: Uuid, column: Snapshot) -> Result<Delivery, HubError> {
    require_snapshot("column", &column)?;
    relay(state, conn, board_id, Event::ColumnCreated { column })
}

/// # Errors
///
/// See [`task_created`].
pub fn column_updated(state: &AppState, conn: &Connection, board_id: Uuid, column: Snapshot) -> Result<Delivery, HubError> {
    require_snapshot("column", &column)?;
    relay(state, conn, board_id, Event::ColumnUpdated { column })
}

/// # Errors
///
/// See [`task_drag_started`].
pub fn column_deleted(
    state: &AppState,
    conn: &Connection,
    board_id: Uuid,
    column_id: String,
) -> Result<Delivery, HubError> {
    require(&[("columnId", &column_id)])?;
    relay(state, conn, board_id, Event::ColumnDeleted { column_id })
}

// =============================================================================
// EDITING FOCUS
// =============================================================================

/// Editing-focus events are stamped with the caller's own identity.
///
/// # Errors
///
/// See [`task_drag_started`].
pub fn user_started_editing(
    state: &AppState,
    conn: &Connection,
    board_id: Uuid,
    item_type: String,
    item_id: String,
) -> Result<Delivery, HubError> {
    require(&[("itemType", &item_type), ("itemId", &item_id)])?;
    let event = Event::UserStartedEditing {
        user_id: conn.user_id(),
        display_name: conn.display_name().to_owned(),
        item_type,
        item_id,
    };
    relay(state, conn, board_id, event)
}

/// # Errors
///
/// See [`task_drag_started`].
pub fn user_stopped_editing(
    state: &AppState,
    conn: &Connection,
    board_id: Uuid,
    item_type: String,
    item_id: String,
) -> Result<Delivery, HubError> {
    require(&[("itemType", &item_type), ("itemId", &item_id)])?;
    relay(state, conn, board_id, Event::UserStoppedEditing { user_id: conn.user_id(), item_type, item_id })
}

// =============================================================================
// HELPERS
// =============================================================================

/// Forward to everyone on the board except the caller.
fn relay(state: &AppState, conn: &Connection, board_id: Uuid, event: Event) -> Result<Delivery, HubError> {
    if !conn.has_joined(board_id) {
        return Err(HubError::NotJoined(board_id));
    }

    let kind = event.kind();
    let frame = Frame::for_board(board_id, event);
    let delivery = state.groups.send_to_group(board_id, &frame, Some(conn.id));
    debug!(%board_id, connection_id = %conn.id, event = kind, delivered = delivery.delivered, "relay: forwarded");
    Ok(delivery)
}

fn require(fields: &[(&str, &String)]) -> Result<(), HubError> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(HubError::Malformed(format!("{name} required"))),
        None => Ok(()),
    }
}

fn require_snapshot(name: &str, snapshot: &Snapshot) -> Result<(), HubError> {
    if snapshot.is_empty() {
        return Err(HubError::Malformed(format!("{name} snapshot required")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
