//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, consumes the ticket, registers an outbound channel with the
//! group router, and enters a `select!` loop:
//! - Incoming client commands → decode + typed dispatch
//! - Frames pushed by board peers → forward to client
//!
//! Dispatch returns the frames meant for the caller only (roster, errors);
//! everything addressed to peers goes through the group router.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `Connected` with connection and user ids
//! 2. Client sends commands → dispatch → caller replies / peer broadcasts
//! 3. Close → disconnect sweep → unregister channel
//!
//! A close that arrives while a command is still running (a slow permission
//! lookup, say) cancels that command before the sweep.

use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::{HashMap, VecDeque};
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::frame::Frame;
use crate::protocol::{Command, Event};
use crate::services::board::{self, HubError, parse_board_id};
use crate::services::session::Identity;
use crate::services::{relay, sweeper};
use crate::state::{AppState, Connection};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let identity = match state.sessions.consume_ticket(ticket).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, identity))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, identity: Identity) {
    let mut conn = Connection::new(identity);

    // Per-connection channel for receiving broadcast frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.channel_capacity);

    let welcome = Frame::new(Event::Connected {
        connection_id: conn.id,
        user_id: conn.user_id(),
        display_name: conn.display_name().to_owned(),
    });
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    state.groups.register(conn.id, client_tx);
    info!(connection_id = %conn.id, user_id = %conn.user_id(), "ws: client connected");

    // Text that arrived while an earlier command was still in flight.
    let mut backlog: VecDeque<Utf8Bytes> = VecDeque::new();

    loop {
        if let Some(text) = backlog.pop_front() {
            if handle_text(&mut socket, &state, &mut conn, &mut backlog, text).await.is_break() {
                break;
            }
            continue;
        }

        tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if handle_text(&mut socket, &state, &mut conn, &mut backlog, text).await.is_break() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    sweeper::sweep_disconnect(&state, &conn);
    state.groups.unregister(conn.id);
    info!(connection_id = %conn.id, "ws: client disconnected");
}

/// Run one command while still watching the socket. A close (or transport
/// error) drops the in-flight command, including any pending permission
/// lookup. Text that arrives meanwhile is queued in `backlog` so commands
/// keep their per-connection order.
async fn handle_text(
    socket: &mut WebSocket,
    state: &AppState,
    conn: &mut Connection,
    backlog: &mut VecDeque<Utf8Bytes>,
    text: Utf8Bytes,
) -> ControlFlow<()> {
    let connection_id = conn.id;
    let frames = {
        let work = process_inbound_text(state, conn, text.as_str());
        tokio::pin!(work);
        loop {
            tokio::select! {
                frames = &mut work => break frames,
                msg = socket.recv() => match msg {
                    Some(Ok(Message::Text(next))) => backlog.push_back(next),
                    Some(Ok(Message::Close(_)) | Err(_)) | None => {
                        info!(%connection_id, "ws: closed with command in flight");
                        return ControlFlow::Break(());
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    };

    for frame in frames {
        if send_frame(socket, &frame).await.is_err() {
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

// =============================================================================
// COMMAND DISPATCH
// =============================================================================

/// Decode and process one inbound text message and return frames for the
/// sender.
///
/// This keeps the websocket transport concerns separate from command
/// handling, so tests can exercise dispatch and broadcast end-to-end.
pub(crate) async fn process_inbound_text(state: &AppState, conn: &mut Connection, text: &str) -> Vec<Frame> {
    let command: Command = match serde_json::from_str(text) {
        Ok(c) => c,
        Err(e) => {
            warn!(connection_id = %conn.id, error = %e, "ws: invalid inbound message");
            return vec![Frame::error_from(&HubError::Malformed(e.to_string()))];
        }
    };

    let op = command.op();
    let raw_board_id = command.raw_board_id().to_owned();
    match dispatch(state, conn, command).await {
        Ok(frames) => frames,
        Err(e) => {
            warn!(connection_id = %conn.id, op, board_id = %raw_board_id, error = %e, "ws: command rejected");
            let frame = Frame::error_from(&e);
            match parse_board_id(&raw_board_id) {
                Ok(board_id) => vec![frame.with_board_id(board_id)],
                Err(_) => vec![frame],
            }
        }
    }
}

/// Route one command to its service. The match is exhaustive over the
/// closed `Command` enum.
async fn dispatch(state: &AppState, conn: &mut Connection, command: Command) -> Result<Vec<Frame>, HubError> {
    let board_id = parse_board_id(command.raw_board_id())?;

    match command {
        Command::JoinBoard { .. } => {
            let users = board::join_board(state, conn, board_id).await?;
            return Ok(vec![Frame::for_board(board_id, Event::BoardRoster { users })]);
        }
        Command::LeaveBoard { .. } => board::leave_board(state, conn, board_id),
        Command::TaskDragStarted { payload, .. } => {
            relay::task_drag_started(state, conn, board_id, payload)?;
        }
        Command::TaskDragEnded { task_id, .. } => {
            relay::task_drag_ended(state, conn, board_id, task_id)?;
        }
        Command::TaskMoved { payload, .. } => {
            relay::task_moved(state, conn, board_id, payload)?;
        }
        Command::ColumnDragStarted { payload, .. } => {
            relay::column_drag_started(state, conn, board_id, payload)?;
        }
        Command::ColumnDragEnded { column_id, .. } => {
            relay::column_drag_ended(state, conn, board_id, column_id)?;
        }
        Command::ColumnMoved { payload, .. } => {
            relay::column_moved(state, conn, board_id, payload)?;
        }
        Command::TaskCreated { task, .. } => {
            relay::task_created(state, conn, board_id, task)?;
        }
        Command::TaskUpdated { task, .. } => {
            relay::task_updated(state, conn, board_id, task)?;
        }
        Command::TaskDeleted { task_id, column_id, .. } => {
            relay::task_deleted(state, conn, board_id, task_id, column_id)?;
        }
        Command::ColumnCreated { column, .. } => {
            relay::column_created(state, conn, board_id, column)?;
        }
        Command::ColumnUpdated { column, .. } => {
            relay::column_updated(state, conn, board_id, column)?;
        }
        Command::ColumnDeleted { column_id, .. } => {
            relay::column_deleted(state, conn, board_id, column_id)?;
        }
        Command::UserStartedEditing { item_type, item_id, .. } => {
            relay::user_started_editing(state, conn, board_id, item_type, item_id)?;
        }
        Command::UserStoppedEditing { item_type, item_id, .. } => {
            relay::user_stopped_editing(state, conn, board_id, item_type, item_id)?;
        }
    }
    Ok(Vec::new())
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if let Event::Error { code, message, .. } = &frame.event {
        warn!(id = %frame.id, code = %code, message = %message, "ws: send error frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
