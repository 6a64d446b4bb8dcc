//! Presence registry — who is viewing which board.
//!
//! DESIGN
//! ======
//! Two sharded concurrent maps:
//! - `boards`: board id -> (user id -> display name)
//! - `memberships`: user id -> board ids, the inverse index the disconnect
//!   sweeper uses so it only visits boards that actually contain the user.
//!
//! Presence is keyed by user, not connection: re-joining overwrites the
//! display name instead of adding a second row. A board entry is removed the
//! moment its last user leaves.
//!
//! Every mutation takes the user's `memberships` entry first and edits
//! `boards` while still holding it. The lock order is always
//! `memberships -> boards`, so one user's join, leave and sweep are
//! serialized and the two maps agree for that user whenever the guard is
//! free. Read-only queries touch `boards` alone. No guard is held across
//! I/O or a frame send.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use uuid::Uuid;

use crate::protocol::PresenceEntry;

/// A board the user was removed from by [`PresenceRegistry::remove_user_everywhere`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub board_id: Uuid,
    pub display_name: String,
}

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    boards: DashMap<Uuid, HashMap<Uuid, String>>,
    memberships: DashMap<Uuid, HashSet<Uuid>>,
}

impl PresenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user_id` on `board_id` and return everyone else already
    /// present, sorted by display name. Re-joining overwrites the name.
    pub fn join(&self, board_id: Uuid, user_id: Uuid, display_name: &str) -> Vec<PresenceEntry> {
        let mut index = self.memberships.entry(user_id).or_default();

        let mut existing = {
            let mut users = self.boards.entry(board_id).or_default();
            let existing: Vec<PresenceEntry> = users
                .iter()
                .filter(|(id, _)| **id != user_id)
                .map(|(id, name)| PresenceEntry { user_id: *id, display_name: name.clone() })
                .collect();
            users.insert(user_id, display_name.to_owned());
            existing
        };
        index.insert(board_id);
        drop(index);

        sort_roster(&mut existing);
        existing
    }

    /// Remove `user_id` from `board_id`. Returns the display name that was
    /// registered, or `None` if the user (or board) was not present.
    pub fn leave(&self, board_id: Uuid, user_id: Uuid) -> Option<String> {
        let removed = {
            let Some(mut index) = self.memberships.get_mut(&user_id) else {
                return None;
            };
            let removed = self.remove_from_board(board_id, user_id);
            index.remove(&board_id);
            removed
        };
        self.memberships.remove_if(&user_id, |_, boards| boards.is_empty());

        removed
    }

    /// Remove `user_id` from every board it is registered on. Only boards in
    /// the user's membership index are visited.
    pub fn remove_user_everywhere(&self, user_id: Uuid) -> Vec<Departure> {
        let mut departures: Vec<Departure> = {
            let Some(mut index) = self.memberships.get_mut(&user_id) else {
                return Vec::new();
            };
            std::mem::take(&mut *index)
                .into_iter()
                .filter_map(|board_id| {
                    self.remove_from_board(board_id, user_id)
                        .map(|display_name| Departure { board_id, display_name })
                })
                .collect()
        };
        self.memberships.remove_if(&user_id, |_, boards| boards.is_empty());

        departures.sort_by_key(|d| d.board_id);
        departures
    }

    /// Everyone currently on `board_id`, sorted by display name.
    #[must_use]
    pub fn roster(&self, board_id: Uuid) -> Vec<PresenceEntry> {
        let mut roster: Vec<PresenceEntry> = self
            .boards
            .get(&board_id)
            .map(|users| {
                users
                    .iter()
                    .map(|(id, name)| PresenceEntry { user_id: *id, display_name: name.clone() })
                    .collect()
            })
            .unwrap_or_default();
        sort_roster(&mut roster);
        roster
    }

    #[must_use]
    pub fn contains(&self, board_id: Uuid, user_id: Uuid) -> bool {
        self.boards
            .get(&board_id)
            .is_some_and(|users| users.contains_key(&user_id))
    }

    /// Number of boards with at least one user present.
    #[must_use]
    pub fn board_count(&self) -> usize {
        self.boards.len()
    }

    /// Boards the membership index lists for `user_id`.
    #[must_use]
    pub fn boards_for(&self, user_id: Uuid) -> HashSet<Uuid> {
        self.memberships
            .get(&user_id)
            .map(|boards| boards.clone())
            .unwrap_or_default()
    }

    fn remove_from_board(&self, board_id: Uuid, user_id: Uuid) -> Option<String> {
        // The shard guard must be released before `remove_if` touches the
        // same shard.
        let removed = self
            .boards
            .get_mut(&board_id)
            .and_then(|mut users| users.remove(&user_id));
        self.boards.remove_if(&board_id, |_, users| users.is_empty());
        removed
    }
}

fn sort_roster(roster: &mut [PresenceEntry]) {
    roster.sort_by(|a, b| {
        a.display_name
            .to_lowercase()
            .cmp(&b.display_name.to_lowercase())
            .then(a.user_id.cmp(&b.user_id))
    });
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
