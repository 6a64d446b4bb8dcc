//! Typed hub client over `tokio-tungstenite`.
//!
//! Used by integration tests and tooling that want to speak the hub
//! protocol without hand-building JSON. Frames that arrive while a call is
//! waiting for its own reply (peer broadcasts) are buffered and handed out
//! by later `recv` calls in arrival order.

use std::collections::VecDeque;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

use crate::frame::Frame;
use crate::protocol::{
    ColumnDrag, ColumnMove, Command, Event, PresenceEntry, Snapshot, TaskDrag, TaskMove,
};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("websocket error: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("timed out waiting for server frame")]
    Timeout,
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("server error {code}: {message}")]
    Server { code: String, message: String },
    #[error("unexpected event: {0}")]
    UnexpectedEvent(&'static str),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WsConnect(Box::new(error))
    }
}

/// Build the websocket URL for a ticket from an http(s) base URL.
///
/// # Errors
///
/// Returns `InvalidBaseUrl` unless `base_url` starts with `http://` or
/// `https://`.
pub fn ws_url(base_url: &str, ticket: &str) -> Result<String, ClientError> {
    let base_url = base_url.trim_end_matches('/');
    if let Some(rest) = base_url.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/api/ws?ticket={ticket}"));
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/api/ws?ticket={ticket}"));
    }

    Err(ClientError::InvalidBaseUrl(base_url.to_owned()))
}

pub struct HubClient {
    stream: WsStream,
    pending: VecDeque<Frame>,
    timeout: Duration,
    pub connection_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
}

impl HubClient {
    /// Connect with a one-time ticket and wait for the `Connected` welcome.
    ///
    /// # Errors
    ///
    /// Fails if the URL is invalid, the upgrade is refused, or the welcome
    /// frame does not arrive in time.
    pub async fn connect(base_url: &str, ticket: &str) -> Result<Self, ClientError> {
        let (mut stream, _) = connect_async(ws_url(base_url, ticket)?).await?;

        let welcome = recv_next(&mut stream, DEFAULT_TIMEOUT).await?;
        let Event::Connected { connection_id, user_id, display_name } = welcome.event else {
            return Err(ClientError::UnexpectedEvent(welcome.event.kind()));
        };

        Ok(Self { stream, pending: VecDeque::new(), timeout: DEFAULT_TIMEOUT, connection_id, user_id, display_name })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a raw command without waiting for anything.
    ///
    /// # Errors
    ///
    /// Fails if the socket write fails.
    pub async fn send(&mut self, command: &Command) -> Result<(), ClientError> {
        let json = serde_json::to_string(command)?;
        self.stream.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Next frame, buffered ones first.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if nothing arrives within `timeout`.
    pub async fn recv(&mut self, timeout: Duration) -> Result<Frame, ClientError> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(frame);
        }
        recv_next(&mut self.stream, timeout).await
    }

    /// Like `recv`, but yields only the event.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if nothing arrives within `timeout`.
    pub async fn recv_event(&mut self, timeout: Duration) -> Result<Event, ClientError> {
        Ok(self.recv(timeout).await?.event)
    }

    /// Join a board and return the roster of users already there.
    ///
    /// # Errors
    ///
    /// Returns `Server` with the error code when the hub rejects the join.
    pub async fn join_board(&mut self, board_id: Uuid) -> Result<Vec<PresenceEntry>, ClientError> {
        self.send(&Command::JoinBoard { board_id: board_id.to_string() }).await?;

        loop {
            let frame = recv_next(&mut self.stream, self.timeout).await?;
            match frame.event {
                Event::BoardRoster { users } if frame.board_id == Some(board_id) => return Ok(users),
                // Errors tagged with another board belong to earlier commands.
                Event::Error { code, message, .. } if frame.board_id.is_none_or(|id| id == board_id) => {
                    return Err(ClientError::Server { code, message });
                }
                _ => self.pending.push_back(frame),
            }
        }
    }

    /// Leave a board. The hub does not reply.
    ///
    /// # Errors
    ///
    /// Fails if the socket write fails.
    pub async fn leave_board(&mut self, board_id: Uuid) -> Result<(), ClientError> {
        self.send(&Command::LeaveBoard { board_id: board_id.to_string() }).await
    }

    pub async fn task_drag_started(&mut self, board_id: Uuid, payload: TaskDrag) -> Result<(), ClientError> {
        self.send(&Command::TaskDragStarted { board_id: board_id.to_string(), payload }).await
    }

    pub async fn task_drag_ended(&mut self, board_id: Uuid, task_id: &str) -> Result<(), ClientError> {
        self.send(&Command::TaskDragEnded { board_id: board_id.to_string(), task_id: task_id.to_owned() })
            .await
    }

    pub async fn task_moved(&mut self, board_id: Uuid, payload: TaskMove) -> Result<(), ClientError> {
        self.send(&Command::TaskMoved { board_id: board_id.to_string(), payload }).await
    }

    pub async fn column_drag_started(&mut self, board_id: Uuid, payload: ColumnDrag) -> Result<(), ClientError> {
        self.send(&Command::ColumnDragStarted { board_id: board_id.to_string(), payload }).await
    }

    pub async fn column_drag_ended(&mut self, board_id: Uuid, column_id: &str) -> Result<(), ClientError> {
        self.send(&Command::ColumnDragEnded { board_id: board_id.to_string(), column_id: column_id.to_owned() })
            .await
    }

    pub async fn column_moved(&mut self, board_id: Uuid, payload: ColumnMove) -> Result<(), ClientError> {
        self.send(&Command::ColumnMoved { board_id: board_id.to_string(), payload }).await
    }

    pub async fn task_created(&mut self, board_id: Uuid, task: Snapshot) -> Result<(), ClientError> {
        self.send(&Command::TaskCreated { board_id: board_id.to_string(), task }).await
    }

    pub async fn task_updated(&mut self, board_id: Uuid, task: Snapshot) -> Result<(), ClientError> {
        self.send(&Command::TaskUpdated { board_id: board_id.to_string(), task }).await
    }

    pub async fn task_deleted(&mut self, board_id: Uuid, task_id: &str, column_id: &str) -> Result<(), ClientError> {
        self.send(&Command::TaskDeleted {
            board_id: board_id.to_string(),
            task_id: task_id.to_owned(),
            column_id: column_id.to_owned(),
        })
        .await
    }

    pub async fn column_created(&mut self, board_id: Uuid, column: Snapshot) -> Result<(), ClientError> {
        self.send(&Command::ColumnCreated { board_id: board_id.to_string(), column }).await
    }

    pub async fn column_updated(&mut self, board_id: Uuid, column: Snapshot) -> Result<(), ClientError> {
        self.send(&Command::ColumnUpdated { board_id: board_id.to_string(), column }).await
    }

    pub async fn column_deleted(&mut self, board_id: Uuid, column_id: &str) -> Result<(), ClientError> {
        self.send(&Command::ColumnDeleted { board_id: board_id.to_string(), column_id: column_id.to_owned() })
            .await
    }

    pub async fn user_started_editing(&mut self, board_id: Uuid, item_type: &str, item_id: &str) -> Result<(), ClientError> {
        self.send(&Command::UserStartedEditing {
            board_id: board_id.to_string(),
            item_type: item_type.to_owned(),
            item_id: item_id.to_owned(),
        })
        .await
    }

    pub async fn user_stopped_editing(&mut self, board_id: Uuid, item_type: &str, item_id: &str) -> Result<(), ClientError> {
        self.send(&Command::UserStoppedEditing {
            board_id: board_id.to_string(),
            item_type: item_type.to_owned(),
            item_id: item_id.to_owned(),
        })
        .await
    }

    /// Close the socket with a normal close frame.
    ///
    /// # Errors
    ///
    /// Fails if the close handshake cannot be written.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}

async fn recv_next(stream: &mut WsStream, timeout: Duration) -> Result<Frame, ClientError> {
    let fut = async {
        loop {
            let Some(message) = stream.next().await else {
                return Err(ClientError::WsClosed);
            };
            match message? {
                Message::Text(text) => return serde_json::from_str(text.as_str()).map_err(ClientError::from),
                Message::Close(_) => return Err(ClientError::WsClosed),
                _ => {}
            }
        }
    };

    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ClientError::Timeout)?
}
