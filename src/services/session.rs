//! WS-ticket consumption and per-connection identity.
//!
//! ARCHITECTURE
//! ============
//! The account service issues one-time, short-lived tickets; the WebSocket
//! upgrade presents one in its query string. The hub consumes the ticket and
//! keeps the resulting `Identity` for the life of the connection. It never
//! issues tickets or checks credentials itself.
//!
//! TRADE-OFFS
//! ==========
//! Ticket consumption is destructive (`DELETE ... RETURNING`) to guarantee
//! single use, so every reconnect needs a fresh ticket.

use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Authenticated identity attached to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub display_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Consume a WS ticket atomically, returning the identity if valid.
    async fn consume_ticket(&self, ticket: &str) -> Result<Option<Identity>, SessionError>;
}

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStore for PgSessionStore {
    async fn consume_ticket(&self, ticket: &str) -> Result<Option<Identity>, SessionError> {
        let row = sqlx::query(
            r"WITH consumed AS (
                  DELETE FROM ws_tickets
                  WHERE ticket = $1 AND expires_at > now()
                  RETURNING user_id
              )
              SELECT u.id, u.name
              FROM consumed c
              JOIN users u ON u.id = c.user_id",
        )
        .bind(ticket)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Identity { user_id: r.get("id"), display_name: r.get("name") }))
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
