//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the one presence registry and group router for the process,
//! plus the external collaborators behind trait objects so tests can swap
//! them. Nothing here is a language-level static.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::services::group::GroupRouter;
use crate::services::permission::PermissionService;
use crate::services::presence::PresenceRegistry;
use crate::services::session::{Identity, SessionStore};

// =============================================================================
// CONNECTION
// =============================================================================

/// One live WebSocket session. Owned by its socket task; handlers borrow it
/// for the duration of a single inbound message.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: Uuid,
    pub identity: Identity,
    /// Boards this connection has joined and not yet left.
    pub boards: HashSet<Uuid>,
}

impl Connection {
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self { id: Uuid::new_v4(), identity, boards: HashSet::new() }
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.identity.user_id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.identity.display_name
    }

    #[must_use]
    pub fn has_joined(&self, board_id: Uuid) -> bool {
        self.boards.contains(&board_id)
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub presence: Arc<PresenceRegistry>,
    pub groups: GroupRouter,
    pub permissions: Arc<dyn PermissionService>,
    pub sessions: Arc<dyn SessionStore>,
    /// Per-connection outbound buffer size.
    pub channel_capacity: usize,
}

impl AppState {
    #[must_use]
    pub fn new(
        permissions: Arc<dyn PermissionService>,
        sessions: Arc<dyn SessionStore>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            presence: Arc::new(PresenceRegistry::new()),
            groups: GroupRouter::new(),
            permissions,
            sessions,
            channel_capacity,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;
