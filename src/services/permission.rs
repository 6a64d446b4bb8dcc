//! Board permission lookup and the join gate built on it.
//!
//! DESIGN
//! ======
//! The board store owns permissions; the hub only asks. `PermissionService`
//! is the seam, `PgPermissionService` reads the store's tables, and
//! `check_minimum` turns any answer into allow/deny. A failed lookup is a
//! denial.
//!
//! The gate runs once per join. After that, group membership is the
//! authorization boundary for relay traffic.

use sqlx::PgPool;
use tracing::{error, warn};
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

/// Board permission level. Declaration order is the privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionLevel {
    Viewer,
    Editor,
    Admin,
    Owner,
}

impl PermissionLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    #[must_use]
    pub fn parse_role(raw: &str) -> Option<Self> {
        match raw {
            "viewer" => Some(Self::Viewer),
            "editor" => Some(Self::Editor),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("permission service unavailable: {0}")]
    Unavailable(String),
}

/// Why the gate refused a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// The user has no level, or one below the requirement.
    Insufficient,
    /// The lookup itself failed.
    LookupFailed,
}

// =============================================================================
// SERVICE
// =============================================================================

#[async_trait::async_trait]
pub trait PermissionService: Send + Sync {
    /// The caller's level on `board_id`, or `None` for no access.
    async fn get_permission(&self, board_id: Uuid, user_id: Uuid) -> Result<Option<PermissionLevel>, PermissionError>;
}

/// Reads board ownership and `board_members` rows. The pool's acquire
/// timeout bounds every lookup.
pub struct PgPermissionService {
    pool: PgPool,
}

impl PgPermissionService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PermissionService for PgPermissionService {
    async fn get_permission(&self, board_id: Uuid, user_id: Uuid) -> Result<Option<PermissionLevel>, PermissionError> {
        let role: Option<Option<String>> = sqlx::query_scalar(
            "SELECT CASE WHEN b.owner_id = $2 THEN 'owner' ELSE m.role END
             FROM boards b
             LEFT JOIN board_members m ON m.board_id = b.id AND m.user_id = $2
             WHERE b.id = $1",
        )
        .bind(board_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match role.flatten() {
            None => Ok(None),
            Some(raw) => PermissionLevel::parse_role(&raw)
                .map(Some)
                .ok_or(PermissionError::UnknownRole(raw)),
        }
    }
}

// =============================================================================
// GATE
// =============================================================================

/// Allow only if the caller holds at least `required` on the board.
/// Fails closed on lookup errors.
///
/// # Errors
///
/// Returns the `Denial` reason when the join must not proceed.
pub async fn check_minimum(
    permissions: &dyn PermissionService,
    board_id: Uuid,
    user_id: Uuid,
    required: PermissionLevel,
) -> Result<PermissionLevel, Denial> {
    match permissions.get_permission(board_id, user_id).await {
        Ok(Some(level)) if level >= required => Ok(level),
        Ok(level) => {
            warn!(%board_id, %user_id, ?level, required = required.as_str(), "permission: insufficient level");
            Err(Denial::Insufficient)
        }
        Err(e) => {
            error!(%board_id, %user_id, error = %e, "permission: lookup failed, denying");
            Err(Denial::LookupFailed)
        }
    }
}

#[cfg(test)]
#[path = "permission_test.rs"]
mod tests;
