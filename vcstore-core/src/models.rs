use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeToRemote {
    #[default]
    None,
    Ahead,
    Behind,
    Diverged,
    Updated,
}

impl RelativeToRemote {
    pub fn as_str(&self) -> &str {
        match self {
            RelativeToRemote::None => "none",
            RelativeToRemote::Ahead => "ahead",
            RelativeToRemote::Behind => "behind",
            RelativeToRemote::Diverged => "diverged",
            RelativeToRemote::Updated => "updated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(RelativeToRemote::None),
            "ahead" => Some(RelativeToRemote::Ahead),
            "behind" => Some(RelativeToRemote::Behind),
            "diverged" => Some(RelativeToRemote::Diverged),
            "updated" => Some(RelativeToRemote::Updated),
            _ => None,
        }
    }
}

/// Merged view of every sync-related flag.
///
/// Only ever changed through [`StatusSnapshot::merge`]; fields absent from an
/// update keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_online: bool,
    pub is_misconfigured: bool,
    pub has_local_changes: bool,
    pub needs_credential: bool,
    pub relative_to_remote: RelativeToRemote,
    pub is_pushing: bool,
    pub is_pulling: bool,
    pub last_synchronized: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn merge(&mut self, update: &StatusUpdate) {
        if let Some(v) = update.is_online {
            self.is_online = v;
        }
        if let Some(v) = update.is_misconfigured {
            self.is_misconfigured = v;
        }
        if let Some(v) = update.has_local_changes {
            self.has_local_changes = v;
        }
        if let Some(v) = update.needs_credential {
            self.needs_credential = v;
        }
        if let Some(v) = update.relative_to_remote {
            self.relative_to_remote = v;
        }
        if let Some(v) = update.is_pushing {
            self.is_pushing = v;
        }
        if let Some(v) = update.is_pulling {
            self.is_pulling = v;
        }
        if let Some(v) = update.last_synchronized {
            self.last_synchronized = Some(v);
        }
    }
}

/// A partial status change, as handed to reporters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_misconfigured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_local_changes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_credential: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_to_remote: Option<RelativeToRemote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pushing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pulling: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synchronized: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_online(mut self, value: bool) -> Self {
        self.is_online = Some(value);
        self
    }

    pub fn with_misconfigured(mut self, value: bool) -> Self {
        self.is_misconfigured = Some(value);
        self
    }

    pub fn with_local_changes(mut self, value: bool) -> Self {
        self.has_local_changes = Some(value);
        self
    }

    pub fn with_needs_credential(mut self, value: bool) -> Self {
        self.needs_credential = Some(value);
        self
    }

    pub fn with_relative_to_remote(mut self, value: RelativeToRemote) -> Self {
        self.relative_to_remote = Some(value);
        self
    }

    pub fn with_pushing(mut self, value: bool) -> Self {
        self.is_pushing = Some(value);
        self
    }

    pub fn with_pulling(mut self, value: bool) -> Self {
        self.is_pulling = Some(value);
        self
    }

    pub fn with_last_synchronized(mut self, value: DateTime<Utc>) -> Self {
        self.last_synchronized = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Remote credential. Lives in memory only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub identity: String,
    pub secret: Option<String>,
    pub format: Option<String>,
}

impl Credential {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: None,
            format: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("format", &self.format)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

impl Committer {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub identity: String,
    pub upstream_url: Option<String>,
    pub branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSummary {
    pub id: String,
    pub summary: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of a fast-forward-only pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    UpToDate,
    FastForwarded,
    /// Local history is strictly ahead of the remote.
    Ahead,
}

/// How a `synchronize()` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Updated,
    Ahead,
    AlreadyRunning,
    LocalChanges,
    Offline,
    NeedsCredential,
    Misconfigured,
    Diverged,
    Failed,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Updated | SyncOutcome::Ahead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let mut snapshot = StatusSnapshot::default();
        snapshot.merge(&StatusUpdate::new().with_online(true).with_pulling(true));
        snapshot.merge(&StatusUpdate::new().with_pulling(false));

        assert!(snapshot.is_online);
        assert!(!snapshot.is_pulling);
        assert_eq!(snapshot.relative_to_remote, RelativeToRemote::None);
    }

    #[test]
    fn test_update_serializes_only_present_fields() {
        let update = StatusUpdate::new().with_relative_to_remote(RelativeToRemote::Diverged);
        let json = serde_json::to_value(&update).unwrap();

        assert_eq!(json, serde_json::json!({"relativeToRemote": "diverged"}));
        assert!(!update.is_empty());
        assert!(StatusUpdate::new().is_empty());
    }

    #[test]
    fn test_relative_to_remote_parse() {
        for value in [
            RelativeToRemote::None,
            RelativeToRemote::Ahead,
            RelativeToRemote::Behind,
            RelativeToRemote::Diverged,
            RelativeToRemote::Updated,
        ] {
            assert_eq!(RelativeToRemote::parse(value.as_str()), Some(value));
        }
        assert_eq!(RelativeToRemote::parse("sideways"), None);
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let credential = Credential::new("alice").with_secret("hunter2");
        let rendered = format!("{:?}", credential);

        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_committer_completeness() {
        let committer = Committer {
            name: "Alice".into(),
            email: " ".into(),
        };
        assert!(!committer.is_complete());
    }
}
