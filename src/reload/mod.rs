// src/reload/mod.rs

//! Live-reload channel for connected preview clients.
//!
//! - [`broadcaster`] fans one reload signal per settled run out to every
//!   subscriber over a tokio broadcast channel. The connected client set is
//!   purely transient: it *is* the set of live subscribers.
//! - [`server`] exposes the channel over a WebSocket endpoint plus a small
//!   client snippet that pages include during development.

pub mod broadcaster;
pub mod server;

pub use broadcaster::{ReloadBroadcaster, ReloadScope, ReloadSignal};
pub use server::{spawn_reload_server, ReloadServerHandle};
