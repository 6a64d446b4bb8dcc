//! Hub services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own presence, routing and permission logic so the route
//! handler can stay focused on protocol translation and transport plumbing.

pub mod board;
pub mod group;
pub mod permission;
pub mod presence;
pub mod relay;
pub mod session;
pub mod sweeper;
