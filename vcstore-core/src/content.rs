//! Raw record storage.
//!
//! A reference is an extension-less logical path such as `notes/2024/intro`.
//! How a reference maps onto files is up to the [`ContentStore`]; the version
//! control side only ever sees the expanded, repository-relative file paths.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct ReadAllQuery {
    pub scope: String,
    pub only_ids: Option<Vec<String>>,
}

impl ReadAllQuery {
    pub fn scope(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            only_ids: None,
        }
    }

    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.only_ids = Some(ids);
        self
    }
}

/// Read/write/list/parse raw record content by reference.
///
/// `meta_fields` name keys derived from the storage location rather than the
/// record body: they are filled with the reference on read and stripped on
/// write.
pub trait ContentStore: Send + Sync {
    fn read(&self, reference: &str, meta_fields: &[&str]) -> Result<Option<Value>>;

    /// `None` removes the record.
    fn write(&self, reference: &str, data: Option<&Value>, meta_fields: &[&str]) -> Result<()>;

    fn exists(&self, reference: &str) -> Result<bool>;

    fn parse(&self, blob: &[u8]) -> Result<Value>;

    fn list_ids(&self, scope: &str) -> Result<Vec<String>>;

    fn read_all(&self, query: &ReadAllQuery, meta_fields: &[&str])
        -> Result<BTreeMap<String, Value>>;

    /// Repository-relative file paths backing a reference.
    fn expand_reference(&self, reference: &str) -> Vec<String>;

    /// Inverse of [`ContentStore::expand_reference`] for a single path.
    fn reference_of(&self, path: &str) -> Option<String>;
}

/// Rejects empty, absolute, hidden or escaping references.
pub fn validate_reference(reference: &str) -> Result<()> {
    let invalid = reference.is_empty()
        || reference.starts_with('/')
        || reference.contains('\\')
        || reference
            .split('/')
            .any(|part| part.is_empty() || part == ".." || part.starts_with('.'));

    if invalid {
        return Err(Error::InvalidReference(reference.to_string()));
    }
    Ok(())
}

/// One pretty-printed JSON document per record at `<reference>.json`.
pub struct JsonFileStore {
    root: PathBuf,
}

const EXTENSION: &str = "json";

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, reference: &str) -> PathBuf {
        self.root.join(format!("{}.{}", reference, EXTENSION))
    }

    fn strip_meta(data: &Value, meta_fields: &[&str]) -> Value {
        let mut data = data.clone();
        if let Value::Object(map) = &mut data {
            for field in meta_fields {
                map.remove(*field);
            }
        }
        data
    }

    fn fill_meta(mut data: Value, reference: &str, meta_fields: &[&str]) -> Value {
        if let Value::Object(map) = &mut data {
            for field in meta_fields {
                map.insert(field.to_string(), Value::String(reference.to_string()));
            }
        }
        data
    }

    /// Removes directories left empty by a delete, stopping at the root.
    fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            if std::fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

impl ContentStore for JsonFileStore {
    fn read(&self, reference: &str, meta_fields: &[&str]) -> Result<Option<Value>> {
        validate_reference(reference)?;
        let path = self.file_path(reference);
        let blob = match std::fs::read(&path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let data = self.parse(&blob)?;
        Ok(Some(Self::fill_meta(data, reference, meta_fields)))
    }

    fn write(&self, reference: &str, data: Option<&Value>, meta_fields: &[&str]) -> Result<()> {
        validate_reference(reference)?;
        let path = self.file_path(reference);

        let Some(data) = data else {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!(reference, "removed record");
                    self.prune_empty_parents(&path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut bytes = serde_json::to_vec_pretty(&Self::strip_meta(data, meta_fields))?;
        bytes.push(b'\n');

        // Write next to the target under a hidden name, then rename over it.
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = path.with_file_name(format!(".{}.tmp", file_name));
        std::fs::write(&staging, &bytes)?;
        std::fs::rename(&staging, &path)?;

        debug!(reference, bytes = bytes.len(), "wrote record");
        Ok(())
    }

    fn exists(&self, reference: &str) -> Result<bool> {
        validate_reference(reference)?;
        Ok(self.file_path(reference).is_file() || self.root.join(reference).is_dir())
    }

    fn parse(&self, blob: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(blob)?)
    }

    fn list_ids(&self, scope: &str) -> Result<Vec<String>> {
        let scope = scope.trim_matches('/');
        let base = if scope.is_empty() || scope == "." {
            self.root.clone()
        } else {
            validate_reference(scope)?;
            self.root.join(scope)
        };
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let walker = WalkDir::new(&base)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !entry.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if let Some(reference) = self.reference_of(&relative) {
                ids.push(reference);
            }
        }

        ids.sort();
        Ok(ids)
    }

    fn read_all(
        &self,
        query: &ReadAllQuery,
        meta_fields: &[&str],
    ) -> Result<BTreeMap<String, Value>> {
        let ids = match &query.only_ids {
            Some(ids) => ids.clone(),
            None => self.list_ids(&query.scope)?,
        };

        let mut records = BTreeMap::new();
        for id in ids {
            if let Some(data) = self.read(&id, meta_fields)? {
                records.insert(id, data);
            }
        }
        Ok(records)
    }

    fn expand_reference(&self, reference: &str) -> Vec<String> {
        vec![format!("{}.{}", reference, EXTENSION)]
    }

    fn reference_of(&self, path: &str) -> Option<String> {
        path.strip_suffix(&format!(".{}", EXTENSION))
            .filter(|reference| validate_reference(reference).is_ok())
            .map(str::to_string)
    }
}
