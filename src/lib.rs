//! # vcstore
//!
//! Umbrella crate for the vcstore workspace: a versioned object store that
//! keeps JSON records in a git working tree and synchronizes them with a
//! remote.

pub use vcstore_core as core;
pub use vcstore_sdk as sdk;
pub use vcstore_server as server;
