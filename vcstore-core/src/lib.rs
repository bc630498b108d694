//! # vcstore-core
//!
//! A versioned object store on top of a git working directory.
//!
//! Records are JSON documents addressed by path-like references. Writes land
//! in the working directory; commits, discards and synchronization with a
//! remote go through the [`VersionControl`] engine, one operation at a time.

pub mod adapter;
pub mod config;
pub mod content;
pub mod diff;
pub mod engine;
pub mod error;
pub mod lock;
pub mod models;
pub mod status;
pub mod store;
mod worktree;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapter::{EntityAdapter, ScopedAdapter};
pub use config::{
    FileSettings, LockOptions, MapSettings, MemorySecretStore, RemoteSettings, SecretStore,
    SettingsSource, StoreOptions,
};
pub use content::{ContentStore, JsonFileStore, ReadAllQuery};
pub use diff::ObjectDiff;
pub use engine::VersionControl;
pub use error::{Error, Failure, Result};
pub use models::{
    CommitSummary, Committer, Credential, RelativeToRemote, RemoteConfig, StatusSnapshot,
    StatusUpdate, SyncOutcome,
};
pub use status::{BroadcastReporter, StatusReporter, TracingReporter};
pub use store::ObjectStore;
