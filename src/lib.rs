//! Real-time presence and event-broadcast hub for kanban boards.
//!
//! ARCHITECTURE
//! ============
//! Browser sessions connect over WebSocket, join one or more boards, and from
//! then on receive every drag, move, create/update/delete and editing-focus
//! event their peers produce on those boards. The hub keeps only ephemeral
//! presence state; boards, columns and tasks live in an external store that
//! re-checks permission on every mutation.

pub mod client;
pub mod config;
pub mod db;
pub mod frame;
pub mod protocol;
pub mod routes;
pub mod services;
pub mod state;
