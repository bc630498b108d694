//! Construction options and the settings contracts they are resolved from.
//!
//! Fixed options ([`StoreOptions`]) describe the local side and never change
//! for the lifetime of a store. Remote settings ([`RemoteSettings`]) are user
//! editable and are read through a [`SettingsSource`].

use crate::error::{Error, Result};
use crate::models::{Committer, RemoteConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_CLONE_DEPTH: u32 = 1;

/// Generic key-value settings lookup.
pub trait SettingsSource: Send + Sync {
    fn get_value(&self, key: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    values: HashMap<String, String>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl SettingsSource for MapSettings {
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }
}

/// Settings read from a TOML document. Dotted keys walk nested tables, so
/// `remote.url` reads `url` from the `[remote]` table.
#[derive(Debug, Clone)]
pub struct FileSettings {
    table: toml::Table,
}

impl FileSettings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Settings(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let table = text
            .parse::<toml::Table>()
            .map_err(|e| Error::Settings(e.to_string()))?;
        Ok(Self { table })
    }
}

impl SettingsSource for FileSettings {
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let mut parts = key.split('.').peekable();
        let mut table = &self.table;

        while let Some(part) = parts.next() {
            let Some(value) = table.get(part) else {
                return Ok(None);
            };
            if parts.peek().is_none() {
                return match value {
                    toml::Value::String(s) => Ok(Some(s.clone())),
                    toml::Value::Integer(i) => Ok(Some(i.to_string())),
                    toml::Value::Boolean(b) => Ok(Some(b.to_string())),
                    toml::Value::Array(items) => Ok(Some(
                        items
                            .iter()
                            .filter_map(|item| item.as_str())
                            .collect::<Vec<_>>()
                            .join(","),
                    )),
                    other => Err(Error::Settings(format!(
                        "{} has unsupported type {}",
                        key,
                        other.type_str()
                    ))),
                };
            }
            table = match value {
                toml::Value::Table(inner) => inner,
                _ => return Ok(None),
            };
        }

        Ok(None)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// How long a caller waits for the repository lock.
    pub timeout: Duration,
    /// Waiters allowed to queue before new callers fail fast.
    pub max_pending: usize,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_pending: 1,
        }
    }
}

/// Options fixed at construction time.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub working_directory: PathBuf,
    pub proxy_url: Option<String>,
    pub upstream_url: Option<String>,
    pub branch: String,
    /// `None` clones full history.
    pub clone_depth: Option<u32>,
    pub probe_timeout: Duration,
    pub lock: LockOptions,
}

impl StoreOptions {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            proxy_url: None,
            upstream_url: None,
            branch: DEFAULT_BRANCH.to_string(),
            clone_depth: Some(DEFAULT_CLONE_DEPTH),
            probe_timeout: Duration::from_secs(10),
            lock: LockOptions::default(),
        }
    }

    pub fn with_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    pub fn with_upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = Some(url.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_clone_depth(mut self, depth: Option<u32>) -> Self {
        self.clone_depth = depth;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_lock_options(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    /// Reads the `store.*` keys. Only `store.working_directory` is required.
    pub fn resolve(source: &dyn SettingsSource) -> Result<Self> {
        let working_directory = source
            .get_value("store.working_directory")?
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Settings("store.working_directory is not set".into()))?;

        let mut options = Self::new(working_directory);
        options.proxy_url = non_empty(source.get_value("store.proxy_url")?);
        options.upstream_url = non_empty(source.get_value("store.upstream_url")?);
        if let Some(branch) = non_empty(source.get_value("store.branch")?) {
            options.branch = branch;
        }
        if let Some(depth) = source.get_value("store.clone_depth")? {
            let depth: u32 = depth
                .parse()
                .map_err(|_| Error::Settings(format!("invalid store.clone_depth: {}", depth)))?;
            options.clone_depth = (depth > 0).then_some(depth);
        }
        Ok(options)
    }
}

/// User-configurable remote settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSettings {
    pub remote_url: String,
    pub identity: String,
    pub author_name: String,
    pub author_email: String,
}

impl RemoteSettings {
    /// Missing keys resolve to empty strings; the sync protocol reports them
    /// as misconfiguration instead of failing construction.
    pub fn resolve(source: &dyn SettingsSource) -> Result<Self> {
        Ok(Self {
            remote_url: source.get_value("remote.url")?.unwrap_or_default(),
            identity: source.get_value("remote.username")?.unwrap_or_default(),
            author_name: source.get_value("author.name")?.unwrap_or_default(),
            author_email: source.get_value("author.email")?.unwrap_or_default(),
        })
    }

    pub fn committer(&self) -> Committer {
        Committer {
            name: self.author_name.clone(),
            email: self.author_email.clone(),
        }
    }

    pub fn remote_config(&self, options: &StoreOptions) -> RemoteConfig {
        RemoteConfig {
            url: self.remote_url.clone(),
            identity: self.identity.clone(),
            upstream_url: options.upstream_url.clone(),
            branch: options.branch.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Persistent secret storage keyed by an arbitrary string (usually the remote
/// URL). The store itself only keeps secrets in memory.
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, key: &str) -> Result<Option<String>>;
    fn set_secret(&self, key: &str, secret: Option<&str>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get_secret(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set_secret(&self, key: &str, secret: Option<&str>) -> Result<()> {
        let mut secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        match secret {
            Some(secret) => secrets.insert(key.to_string(), secret.to_string()),
            None => secrets.remove(key),
        };
        Ok(())
    }
}
