//! Entity adapters: domain-level owners of a slice of the store.
//!
//! The store owns its adapters and hands itself to them in callbacks, so an
//! adapter never holds a reference back to the store.

use crate::error::Result;
use crate::store::ObjectStore;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

pub trait EntityAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Maps a domain id onto a store reference.
    fn resolve_reference(&self, id: &str) -> String {
        id.to_string()
    }

    /// Inverse of [`EntityAdapter::resolve_reference`].
    fn resolve_id(&self, reference: &str) -> String {
        reference.to_string()
    }

    /// Whether a changed repository path belongs to this adapter. Changes
    /// nobody claims are discarded before synchronizing.
    fn manages_reference(&self, path: &str) -> bool;

    /// (Re)build in-memory state from the working directory.
    fn init(&self, store: &ObjectStore) -> Result<()>;

    /// Called after a synchronization that brought in remote data.
    fn on_data_changed(&self) {}
}

/// Manages every object under one directory prefix. Ids are relative to the
/// prefix: id `intro` in scope `notes` lives at reference `notes/intro`.
pub struct ScopedAdapter {
    scope: String,
    id_field: Option<String>,
    index: RwLock<BTreeSet<String>>,
    data_changes: AtomicUsize,
}

impl ScopedAdapter {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into().trim_matches('/').to_string(),
            id_field: None,
            index: RwLock::new(BTreeSet::new()),
            data_changes: AtomicUsize::new(0),
        }
    }

    /// Field filled with the id on read and stripped on write.
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn meta_fields(&self) -> Vec<&str> {
        self.id_field.as_deref().into_iter().collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// How many times remote data changes were announced.
    pub fn data_changes(&self) -> usize {
        self.data_changes.load(Ordering::Acquire)
    }

    pub fn create(&self, store: &ObjectStore, id: &str, data: &Value) -> Result<()> {
        store.create(data, &self.resolve_reference(id), &self.meta_fields())?;
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
        Ok(())
    }

    pub fn read(&self, store: &ObjectStore, id: &str) -> Result<Option<Value>> {
        store.read(&self.resolve_reference(id), &self.meta_fields())
    }

    pub fn update(&self, store: &ObjectStore, id: &str, data: &Value) -> Result<()> {
        store.update(&self.resolve_reference(id), data, &self.meta_fields())
    }

    pub fn delete(&self, store: &ObjectStore, id: &str) -> Result<()> {
        store.delete(&self.resolve_reference(id))?;
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }

    pub async fn commit(
        &self,
        store: &ObjectStore,
        ids: &[&str],
        message: &str,
        removing: bool,
    ) -> Result<usize> {
        let references: Vec<String> = ids.iter().map(|id| self.resolve_reference(id)).collect();
        store.commit(&references, message, removing).await
    }

    pub async fn read_version(
        &self,
        store: &ObjectStore,
        id: &str,
        revision: &str,
    ) -> Result<Option<Value>> {
        store
            .read_version(&self.resolve_reference(id), revision)
            .await
    }
}

impl EntityAdapter for ScopedAdapter {
    fn name(&self) -> &str {
        &self.scope
    }

    fn resolve_reference(&self, id: &str) -> String {
        format!("{}/{}", self.scope, id)
    }

    fn resolve_id(&self, reference: &str) -> String {
        reference
            .strip_prefix(&self.scope)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(reference)
            .to_string()
    }

    fn manages_reference(&self, path: &str) -> bool {
        path.strip_prefix(&self.scope)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    fn init(&self, store: &ObjectStore) -> Result<()> {
        let ids: BTreeSet<String> = store
            .list_ids(&self.scope)?
            .iter()
            .map(|reference| self.resolve_id(reference))
            .collect();
        debug!(scope = %self.scope, count = ids.len(), "indexed objects");
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = ids;
        Ok(())
    }

    fn on_data_changed(&self) {
        self.data_changes.fetch_add(1, Ordering::AcqRel);
    }
}
