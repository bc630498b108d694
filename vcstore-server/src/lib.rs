//! # vcstore-server
//!
//! HTTP surface for a vcstore working directory, with a periodic sync timer
//! and a watcher that tracks edits made outside the API.

pub mod api;
pub mod server;
pub mod watcher;

pub use api::{create_router, AppState};
pub use server::{spawn_sync_timer, StoreServer};
pub use watcher::ChangeWatcher;
