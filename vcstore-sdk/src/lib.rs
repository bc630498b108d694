//! # vcstore-sdk
//!
//! Blocking client for a running vcstore server.
//!
//! ## Example
//!
//! ```no_run
//! use vcstore_sdk::StoreClient;
//! use serde_json::json;
//!
//! let client = StoreClient::new("http://localhost:3030");
//!
//! client.create_object("notes/intro", &json!({"title": "Intro"})).unwrap();
//! client.commit(Some(&["notes/intro"]), "Add intro").unwrap();
//! client.request_push().unwrap();
//! client.synchronize().unwrap();
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone)]
pub struct StoreClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub is_online: bool,
    pub is_misconfigured: bool,
    pub has_local_changes: bool,
    pub needs_credential: bool,
    pub relative_to_remote: String,
    pub is_pushing: bool,
    pub is_pulling: bool,
    pub last_synchronized: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncReport {
    /// `updated`, `ahead`, `local_changes`, `offline`, ...
    pub outcome: String,
    pub status: Status,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub summary: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteInfo {
    pub url: String,
    pub identity: String,
    pub upstream_url: Option<String>,
    pub branch: String,
}

#[derive(Serialize)]
struct CreateObjectRequest<'a> {
    id: &'a str,
    data: &'a Value,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    ids: Option<&'a [&'a str]>,
    message: &'a str,
}

#[derive(Serialize)]
struct DiscardRequest<'a> {
    ids: Option<&'a [&'a str]>,
}

#[derive(Serialize)]
struct CredentialRequest<'a> {
    identity: &'a str,
    secret: Option<&'a str>,
    persist: bool,
}

#[derive(Deserialize)]
struct Count {
    count: usize,
}

#[derive(Deserialize)]
struct Committed {
    committed: usize,
}

#[derive(Deserialize)]
struct Discarded {
    discarded: Vec<String>,
}

impl StoreClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the vcstore server (e.g., "http://localhost:3030")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn object_url(&self, id: &str) -> String {
        self.url(&format!("/objects/{}", id.trim_matches('/')))
    }

    /// Check server health
    pub fn health_check(&self) -> Result<bool> {
        let response = self.client.get(self.url("/health")).send()?;
        Ok(response.status().is_success())
    }

    pub fn status(&self) -> Result<Status> {
        Ok(self
            .client
            .get(self.url("/status"))
            .send()?
            .error_for_status()?
            .json()?)
    }

    /// References with uncommitted changes
    pub fn list_uncommitted(&self) -> Result<Vec<String>> {
        Ok(self
            .client
            .get(self.url("/uncommitted"))
            .send()?
            .error_for_status()?
            .json()?)
    }

    pub fn count_uncommitted(&self) -> Result<usize> {
        let count: Count = self
            .client
            .get(self.url("/uncommitted/count"))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(count.count)
    }

    /// Run one synchronization cycle on the server
    pub fn synchronize(&self) -> Result<SyncReport> {
        Ok(self
            .client
            .post(self.url("/sync"))
            .send()?
            .error_for_status()?
            .json()?)
    }

    /// Throw away uncommitted changes; all of them when `ids` is `None`
    pub fn discard(&self, ids: Option<&[&str]>) -> Result<Vec<String>> {
        let discarded: Discarded = self
            .client
            .post(self.url("/discard"))
            .json(&DiscardRequest { ids })
            .send()?
            .error_for_status()?
            .json()?;
        Ok(discarded.discarded)
    }

    pub fn set_credential(&self, identity: &str, secret: Option<&str>, persist: bool) -> Result<()> {
        self.client
            .put(self.url("/credential"))
            .json(&CredentialRequest {
                identity,
                secret,
                persist,
            })
            .send()?
            .error_for_status()?;
        Ok(())
    }

    /// Ask the server to push on its next synchronization
    pub fn request_push(&self) -> Result<()> {
        self.client
            .post(self.url("/push"))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    pub fn committer(&self) -> Result<Committer> {
        Ok(self
            .client
            .get(self.url("/committer"))
            .send()?
            .error_for_status()?
            .json()?)
    }

    pub fn remote(&self) -> Result<RemoteInfo> {
        Ok(self
            .client
            .get(self.url("/remote"))
            .send()?
            .error_for_status()?
            .json()?)
    }

    pub fn list_objects(&self, scope: &str) -> Result<Vec<String>> {
        Ok(self
            .client
            .get(self.url("/objects"))
            .query(&[("scope", scope)])
            .send()?
            .error_for_status()?
            .json()?)
    }

    pub fn create_object(&self, id: &str, data: &Value) -> Result<()> {
        self.client
            .post(self.url("/objects"))
            .json(&CreateObjectRequest { id, data })
            .send()?
            .error_for_status()?;
        Ok(())
    }

    /// `Ok(None)` when the object does not exist
    pub fn read_object(&self, id: &str) -> Result<Option<Value>> {
        self.get_object(self.client.get(self.object_url(id)))
    }

    /// The object as it was at `revision`
    pub fn read_object_at(&self, id: &str, revision: &str) -> Result<Option<Value>> {
        self.get_object(
            self.client
                .get(self.object_url(id))
                .query(&[("rev", revision)]),
        )
    }

    fn get_object(&self, request: reqwest::blocking::RequestBuilder) -> Result<Option<Value>> {
        let response = request.send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json()?))
    }

    pub fn update_object(&self, id: &str, data: &Value) -> Result<()> {
        self.client
            .put(self.object_url(id))
            .json(data)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    pub fn delete_object(&self, id: &str) -> Result<()> {
        self.client
            .delete(self.object_url(id))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    /// Commit pending changes of `ids`, or everything when `None`.
    /// Returns how many files went into the commit.
    pub fn commit(&self, ids: Option<&[&str]>, message: &str) -> Result<usize> {
        let committed: Committed = self
            .client
            .post(self.url("/commits"))
            .json(&CommitRequest { ids, message })
            .send()?
            .error_for_status()?
            .json()?;
        Ok(committed.committed)
    }

    /// Get commit history, newest first
    pub fn commits(&self, limit: usize) -> Result<Vec<CommitInfo>> {
        Ok(self
            .client
            .get(self.url("/commits"))
            .query(&[("limit", limit)])
            .send()?
            .error_for_status()?
            .json()?)
    }
}
