//! The object store facade.
//!
//! Ties raw record storage to version control: objects are written through a
//! [`ContentStore`] into the working directory and committed, discarded and
//! synchronized through the [`VersionControl`] engine.

use crate::adapter::EntityAdapter;
use crate::config::{RemoteSettings, StoreOptions};
use crate::content::{ContentStore, JsonFileStore, ReadAllQuery};
use crate::diff::ObjectDiff;
use crate::engine::VersionControl;
use crate::error::{Error, Result};
use crate::models::{
    CommitSummary, Committer, Credential, RemoteConfig, StatusSnapshot, SyncOutcome,
};
use crate::status::StatusReporter;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info, warn};

pub struct ObjectStore {
    content: Arc<dyn ContentStore>,
    engine: VersionControl,
    adapters: RwLock<Vec<Arc<dyn EntityAdapter>>>,
    initialized: AtomicBool,
}

/// Whether a changed repository path belongs to a reference: the path is the
/// reference itself, the reference plus an extension, or lies beneath it.
fn path_matches(path: &str, reference: &str) -> bool {
    if path == reference {
        return true;
    }
    if let Some(rest) = path.strip_prefix(reference) {
        if rest.starts_with('/') {
            return true;
        }
        if let Some(extension) = rest.strip_prefix('.') {
            return !extension.is_empty() && !extension.contains('/');
        }
    }
    false
}

impl ObjectStore {
    pub fn new(
        options: StoreOptions,
        settings: RemoteSettings,
        content: Arc<dyn ContentStore>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            content,
            engine: VersionControl::new(options, settings, reporter),
            adapters: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// JSON records stored directly in the working directory.
    pub fn with_json_store(
        options: StoreOptions,
        settings: RemoteSettings,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        let content = Arc::new(JsonFileStore::new(options.working_directory.clone()));
        Self::new(options, settings, content, reporter)
    }

    pub fn engine(&self) -> &VersionControl {
        &self.engine
    }

    pub fn content(&self) -> &dyn ContentStore {
        self.content.as_ref()
    }

    pub fn working_directory(&self) -> &Path {
        self.engine.working_directory()
    }

    fn adapters(&self) -> Vec<Arc<dyn EntityAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn resolve_reference(&self, obj_id: &str) -> String {
        obj_id.trim_matches('/').to_string()
    }

    // Objects

    pub fn create(&self, data: &Value, reference: &str, meta_fields: &[&str]) -> Result<()> {
        if self.content.exists(reference)? {
            return Err(Error::AlreadyExists(reference.to_string()));
        }
        self.content.write(reference, Some(data), meta_fields)
    }

    pub fn read(&self, obj_id: &str, meta_fields: &[&str]) -> Result<Option<Value>> {
        self.content
            .read(&self.resolve_reference(obj_id), meta_fields)
    }

    pub fn update(&self, obj_id: &str, data: &Value, meta_fields: &[&str]) -> Result<()> {
        let reference = self.resolve_reference(obj_id);
        if !self.content.exists(&reference)? {
            return Err(Error::NotFound(reference));
        }
        self.content.write(&reference, Some(data), meta_fields)
    }

    pub fn delete(&self, obj_id: &str) -> Result<()> {
        let reference = self.resolve_reference(obj_id);
        if !self.content.exists(&reference)? {
            return Err(Error::NotFound(reference));
        }
        self.content.write(&reference, None, &[])
    }

    pub fn list_ids(&self, scope: &str) -> Result<Vec<String>> {
        self.content.list_ids(scope)
    }

    pub fn read_all(
        &self,
        query: &ReadAllQuery,
        meta_fields: &[&str],
    ) -> Result<BTreeMap<String, Value>> {
        self.content.read_all(query, meta_fields)
    }

    /// Reads an object as it was at `revision`. `Ok(None)` when it did not
    /// exist there.
    pub async fn read_version(&self, obj_id: &str, revision: &str) -> Result<Option<Value>> {
        let reference = self.resolve_reference(obj_id);
        let paths = self.content.expand_reference(&reference);
        let [path] = paths.as_slice() else {
            return Err(Error::MultiFileReference(reference));
        };

        match self.engine.read_historical_content(path, revision).await? {
            Some(blob) => Ok(Some(self.content.parse(&blob)?)),
            None => Ok(None),
        }
    }

    /// Line diff from `revision` to the working copy.
    pub async fn diff(&self, obj_id: &str, revision: &str) -> Result<ObjectDiff> {
        let old = self.read_version(obj_id, revision).await?;
        let new = self.read(obj_id, &[])?;
        ObjectDiff::from_values(&self.resolve_reference(obj_id), old.as_ref(), new.as_ref())
    }

    // Version control

    async fn matching_changes(&self, obj_ids: &[String]) -> Result<Vec<String>> {
        let references: Vec<String> = obj_ids
            .iter()
            .map(|id| self.resolve_reference(id))
            .collect();
        let changed = self.engine.list_changed_paths(&["."]).await?;
        Ok(changed
            .into_iter()
            .filter(|path| references.iter().any(|r| path_matches(path, r)))
            .collect())
    }

    /// Commits pending changes of the given objects only. Returns how many
    /// paths went into the commit; zero means nothing was committed.
    pub async fn commit(&self, obj_ids: &[String], message: &str, removing: bool) -> Result<usize> {
        let matches = self.matching_changes(obj_ids).await?;
        if matches.is_empty() {
            info!(ids = ?obj_ids, "no pending changes for objects");
            return Ok(0);
        }
        self.engine
            .stage_and_commit(&matches, message, removing)
            .await
    }

    pub async fn commit_all(&self, message: &str, removing: bool) -> Result<usize> {
        let changed = self.engine.list_changed_paths(&["."]).await?;
        if changed.is_empty() {
            return Ok(0);
        }
        self.engine
            .stage_and_commit(&changed, message, removing)
            .await
    }

    /// Throws away pending changes of the given objects.
    pub async fn discard(&self, obj_ids: &[String]) -> Result<Vec<String>> {
        let matches = self.matching_changes(obj_ids).await?;
        if matches.is_empty() {
            return Ok(matches);
        }
        self.engine.reset_paths(Some(matches)).await
    }

    pub async fn discard_all(&self) -> Result<Vec<String>> {
        self.engine.reset_paths(None).await
    }

    /// References with pending changes, one entry per object.
    pub async fn list_uncommitted(&self) -> Result<Vec<String>> {
        let changed = self.engine.list_changed_paths(&["."]).await?;
        let references: BTreeSet<String> = changed
            .into_iter()
            .map(|path| self.content.reference_of(&path).unwrap_or(path))
            .collect();
        Ok(references.into_iter().collect())
    }

    pub async fn count_uncommitted(&self) -> Result<usize> {
        Ok(self.list_uncommitted().await?.len())
    }

    /// Whether some adapter owns a changed path. Without adapters every path
    /// counts as owned, so nothing is ever discarded implicitly.
    fn claims(adapters: &[Arc<dyn EntityAdapter>], path: &str) -> bool {
        adapters.is_empty() || adapters.iter().any(|a| a.manages_reference(path))
    }

    /// Discards changes to paths no adapter manages. Returns them.
    pub async fn reset_orphaned_file_changes(&self) -> Result<Vec<String>> {
        let adapters = self.adapters();
        let orphaned: Vec<String> = self
            .engine
            .list_changed_paths(&["."])
            .await?
            .into_iter()
            .filter(|path| !Self::claims(&adapters, path))
            .collect();
        if orphaned.is_empty() {
            return Ok(orphaned);
        }
        warn!(paths = ?orphaned, "discarding changes to unmanaged paths");
        self.engine.reset_paths(Some(orphaned)).await
    }

    // Lifecycle

    pub fn register_manager(&self, adapter: Arc<dyn EntityAdapter>) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Err(Error::InvalidOperation(format!(
                "cannot register {} after init",
                adapter.name()
            )));
        }
        info!(adapter = adapter.name(), "registered entity adapter");
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(adapter);
        Ok(())
    }

    /// Brings the working directory up and runs a first synchronization.
    ///
    /// Reclones when `force_reset` is set, when the clone points at other
    /// remotes, or when its state cannot be determined. A failing clone is
    /// returned as an error; everything after that is reported as an outcome.
    pub async fn init(&self, force_reset: bool) -> Result<SyncOutcome> {
        let usable = match self.engine.is_initialized() {
            Ok(true) => self.engine.is_using_configured_remotes().unwrap_or(false),
            Ok(false) => false,
            Err(err) => {
                warn!(error = %err, "cannot determine repository state");
                false
            }
        };
        if force_reset || !usable {
            info!(force_reset, "initializing working directory");
            self.engine.force_initialize().await?;
        }
        self.initialized.store(true, Ordering::Release);

        let outcome = self.synchronize().await?;
        if !outcome.is_success() {
            // Hooks did not run; adapters still need their index.
            for adapter in self.adapters() {
                if let Err(err) = adapter.init(self) {
                    error!(adapter = adapter.name(), error = %err, "adapter init failed");
                }
            }
        }
        Ok(outcome)
    }

    /// One synchronization cycle. After every successful cycle each adapter is
    /// re-initialized and notified once, in registration order.
    pub async fn synchronize(&self) -> Result<SyncOutcome> {
        let adapters = self.adapters();
        let claims = |path: &str| Self::claims(&adapters, path);
        let outcome = self.engine.synchronize(&claims).await?;

        if outcome.is_success() {
            for adapter in &adapters {
                if let Err(err) = adapter.init(self) {
                    error!(adapter = adapter.name(), error = %err, "adapter init failed");
                    continue;
                }
                adapter.on_data_changed();
            }
        }
        Ok(outcome)
    }

    // Passthroughs

    pub fn set_credential(&self, credential: Option<Credential>) {
        self.engine.set_credential(credential)
    }

    pub fn credential(&self) -> Option<Credential> {
        self.engine.credential()
    }

    pub fn request_deferred_push(&self) {
        self.engine.request_deferred_push()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.engine.status()
    }

    pub async fn check_uncommitted(&self) -> Result<bool> {
        self.engine.check_uncommitted().await
    }

    pub fn committer(&self) -> Committer {
        self.engine.committer()
    }

    pub fn remote_config(&self) -> RemoteConfig {
        self.engine.remote_config()
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<CommitSummary>> {
        self.engine.history(limit).await
    }
}
