//! Version control engine.
//!
//! Owns one working directory. Every operation other than the two no-lock
//! checks (`is_initialized`, `is_using_remote_urls`) runs under the
//! [`RepoLock`], with git2 work handed to the blocking pool. Each blocking job
//! holds its own share of the lock, so a caller that stops waiting never
//! frees the repository while the job is still running.

use crate::config::{RemoteSettings, StoreOptions};
use crate::error::{Error, Failure, Result};
use crate::lock::{RepoGuard, RepoLock};
use crate::models::{
    CommitSummary, Committer, Credential, PullOutcome, RelativeToRemote, RemoteConfig,
    StatusSnapshot, StatusUpdate, SyncOutcome,
};
use crate::status::{StatusReporter, StatusTracker};
use crate::worktree::{self, RemoteAccess, ORIGIN, UPSTREAM};
use chrono::Utc;
use git2::{ErrorCode, Repository};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

pub struct VersionControl {
    options: StoreOptions,
    settings: RemoteSettings,
    lock: RepoLock,
    credential: Mutex<Option<Credential>>,
    deferred_push: AtomicBool,
    sync_in_flight: AtomicBool,
    status: StatusTracker,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn remove_dir(workdir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(workdir) {
        Ok(()) => {
            info!(workdir = %workdir.display(), "removed working directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl VersionControl {
    pub fn new(
        options: StoreOptions,
        settings: RemoteSettings,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        let lock = RepoLock::new(options.lock);
        Self {
            options,
            settings,
            lock,
            credential: Mutex::new(None),
            deferred_push: AtomicBool::new(false),
            sync_in_flight: AtomicBool::new(false),
            status: StatusTracker::new(reporter),
        }
    }

    pub fn working_directory(&self) -> &Path {
        &self.options.working_directory
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn committer(&self) -> Committer {
        self.settings.committer()
    }

    pub fn remote_config(&self) -> RemoteConfig {
        self.settings.remote_config(&self.options)
    }

    /// Runs `f` on the blocking pool while holding a share of `guard`.
    async fn blocking<T, F>(&self, guard: &RepoGuard, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let held = guard.clone();
        match tokio::task::spawn_blocking(move || {
            let _held = held;
            f()
        })
        .await
        {
            Ok(result) => result,
            Err(e) => Err(Error::Worker(e.to_string())),
        }
    }

    async fn with_repo<T, F>(&self, guard: &RepoGuard, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let workdir = self.options.working_directory.clone();
        self.blocking(guard, move || {
            let repo = worktree::open(&workdir)?;
            f(&repo)
        })
        .await
    }

    fn access(&self) -> RemoteAccess {
        let credential = self.credential();
        let username = credential
            .as_ref()
            .map(|c| c.identity.clone())
            .filter(|identity| !identity.is_empty())
            .or_else(|| Some(self.settings.identity.clone()).filter(|i| !i.is_empty()));

        RemoteAccess {
            username,
            secret: credential.and_then(|c| c.secret),
            proxy_url: self.options.proxy_url.clone(),
        }
    }

    // No-lock checks

    /// `Ok(false)` for a missing directory or one that holds no repository;
    /// `Err` when the state cannot be determined.
    pub fn is_initialized(&self) -> Result<bool> {
        let workdir = &self.options.working_directory;
        if !workdir.exists() {
            return Ok(false);
        }
        match Repository::open(workdir) {
            Ok(repo) => Ok(!repo.is_bare()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_using_remote_urls(&self, origin: &str, upstream: Option<&str>) -> Result<bool> {
        let repo = worktree::open(&self.options.working_directory)?;
        if worktree::remote_url(&repo, ORIGIN)?.as_deref() != Some(origin) {
            return Ok(false);
        }
        match upstream {
            Some(expected) => Ok(worktree::remote_url(&repo, UPSTREAM)?.as_deref() == Some(expected)),
            None => Ok(true),
        }
    }

    pub fn is_using_configured_remotes(&self) -> Result<bool> {
        self.is_using_remote_urls(&self.settings.remote_url, self.options.upstream_url.as_deref())
    }

    // Lifecycle

    pub async fn destroy(&self) -> Result<()> {
        let guard = self.lock.acquire().await?;
        self.remove_working_directory(&guard).await
    }

    async fn remove_working_directory(&self, guard: &RepoGuard) -> Result<()> {
        let workdir = self.options.working_directory.clone();
        self.blocking(guard, move || remove_dir(&workdir)).await
    }

    /// Replaces the working directory with a fresh clone of the remote.
    ///
    /// Failure leaves no directory behind; the error is classified into the
    /// status snapshot and returned.
    pub async fn force_initialize(&self) -> Result<()> {
        let guard = self.lock.acquire().await?;

        if self.settings.remote_url.trim().is_empty() {
            let err = Error::Misconfigured("remote URL".into());
            self.record_failure(&err);
            return Err(err);
        }

        let workdir: PathBuf = self.options.working_directory.clone();
        let remote_url = self.settings.remote_url.clone();
        let upstream_url = self.options.upstream_url.clone();
        let branch = self.options.branch.clone();
        let depth = self.options.clone_depth;
        let access = self.access();
        info!(workdir = %workdir.display(), remote = %remote_url, ?depth, "cloning remote");

        let result = self
            .blocking(&guard, move || {
                remove_dir(&workdir)?;
                let cloned = worktree::clone_into(
                    &workdir,
                    &remote_url,
                    upstream_url.as_deref(),
                    &branch,
                    depth,
                    &access,
                );
                if cloned.is_err() {
                    if let Err(cleanup) = remove_dir(&workdir) {
                        warn!(error = %cleanup, "failed to remove half-initialized directory");
                    }
                }
                cloned
            })
            .await;

        match result {
            Ok(()) => {
                self.status.update(
                    StatusUpdate::new()
                        .with_online(true)
                        .with_local_changes(false)
                        .with_relative_to_remote(RelativeToRemote::None),
                );
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "initialization failed");
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    // Credentials

    pub fn set_credential(&self, credential: Option<Credential>) {
        *self.credential.lock().unwrap_or_else(PoisonError::into_inner) = credential;
    }

    pub fn credential(&self) -> Option<Credential> {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear_secret(&self) {
        if let Some(credential) = self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            credential.secret = None;
        }
    }

    /// HTTP remotes need a secret; local paths and SSH (agent) do not.
    pub fn requires_credential(&self) -> bool {
        let url = self.settings.remote_url.to_ascii_lowercase();
        url.starts_with("http://") || url.starts_with("https://")
    }

    fn has_secret(&self) -> bool {
        self.credential()
            .and_then(|c| c.secret)
            .is_some_and(|secret| !secret.is_empty())
    }

    // Repository operations

    pub async fn read_historical_content(
        &self,
        path: &str,
        revision: &str,
    ) -> Result<Option<Vec<u8>>> {
        let guard = self.lock.acquire().await?;
        let (path, revision) = (path.to_string(), revision.to_string());
        self.with_repo(&guard, move |repo| worktree::blob_at(repo, &path, &revision))
            .await
    }

    /// Fast-forward-only pull of the tracked branch. Fails with
    /// [`Error::LocalChanges`] instead of overwriting uncommitted edits.
    pub async fn pull(&self) -> Result<PullOutcome> {
        let guard = self.lock.acquire().await?;
        self.pull_locked(&guard).await
    }

    async fn pull_locked(&self, guard: &RepoGuard) -> Result<PullOutcome> {
        let branch = self.options.branch.clone();
        let access = self.access();
        self.with_repo(guard, move |repo| {
            worktree::fetch_branch(repo, ORIGIN, &branch, None, &access)?;
            worktree::fast_forward(repo, &branch)
        })
        .await
    }

    pub async fn stage(&self, paths: &[String], removing: bool) -> Result<()> {
        let guard = self.lock.acquire().await?;
        let paths = paths.to_vec();
        self.with_repo(&guard, move |repo| worktree::stage(repo, &paths, removing))
            .await
    }

    /// Commits whatever is staged. Returns the new commit id.
    pub async fn commit(&self, message: &str) -> Result<String> {
        let guard = self.lock.acquire().await?;
        let message = message.to_string();
        let author = self.settings.committer();
        let oid = self
            .with_repo(&guard, move |repo| worktree::commit(repo, &message, &author))
            .await
            .inspect_err(|err| {
                self.record_failure(err);
            })?;
        self.status
            .update(StatusUpdate::new().with_relative_to_remote(RelativeToRemote::Ahead));
        self.refresh_local_changes(&guard).await?;
        Ok(oid.to_string())
    }

    pub async fn fetch_remote(&self) -> Result<bool> {
        let guard = self.lock.acquire().await?;
        self.fetch_locked(&guard, ORIGIN).await
    }

    pub async fn fetch_upstream(&self) -> Result<bool> {
        if self.options.upstream_url.is_none() {
            return Err(Error::Misconfigured("upstream URL".into()));
        }
        let guard = self.lock.acquire().await?;
        self.fetch_locked(&guard, UPSTREAM).await
    }

    async fn fetch_locked(&self, guard: &RepoGuard, remote: &'static str) -> Result<bool> {
        let branch = self.options.branch.clone();
        let access = self.access();
        self.with_repo(guard, move |repo| {
            worktree::fetch_branch(repo, remote, &branch, None, &access)
        })
        .await
    }

    pub async fn push(&self, force: bool) -> Result<()> {
        let guard = self.lock.acquire().await?;
        self.push_locked(&guard, force).await
    }

    async fn push_locked(&self, guard: &RepoGuard, force: bool) -> Result<()> {
        let branch = self.options.branch.clone();
        let access = self.access();
        self.with_repo(guard, move |repo| worktree::push(repo, &branch, force, &access))
            .await
    }

    /// Hard-resets the given paths, or every changed path when `None`.
    /// Returns the paths that were reset.
    pub async fn reset_paths(&self, paths: Option<Vec<String>>) -> Result<Vec<String>> {
        let guard = self.lock.acquire().await?;
        let reset = self
            .with_repo(&guard, move |repo| {
                let paths = match paths {
                    Some(paths) => paths,
                    None => worktree::changed_paths(repo, &[".".to_string()])?,
                };
                worktree::reset_paths(repo, &paths)?;
                Ok(paths)
            })
            .await?;
        self.refresh_local_changes(&guard).await?;
        Ok(reset)
    }

    pub async fn list_changed_paths(&self, scopes: &[&str]) -> Result<Vec<String>> {
        let guard = self.lock.acquire().await?;
        let scopes = scopes.iter().map(|s| s.to_string()).collect();
        self.changed_paths_locked(&guard, scopes).await
    }

    async fn changed_paths_locked(
        &self,
        guard: &RepoGuard,
        scopes: Vec<String>,
    ) -> Result<Vec<String>> {
        self.with_repo(guard, move |repo| worktree::changed_paths(repo, &scopes))
            .await
    }

    /// Unstages everything, stages the requested paths that have pending
    /// changes and commits them, all under one lock acquisition.
    ///
    /// Returns how many requested paths had changes; zero means no commit.
    pub async fn stage_and_commit(
        &self,
        paths: &[String],
        message: &str,
        removing: bool,
    ) -> Result<usize> {
        let guard = self.lock.acquire().await?;

        let author = self.settings.committer();
        if !author.is_complete() {
            let err = Error::Misconfigured("author name and email".into());
            self.record_failure(&err);
            return Err(err);
        }

        let wanted: BTreeSet<String> = paths.iter().cloned().collect();
        let message = message.to_string();
        let committed = self
            .with_repo(&guard, move |repo| {
                let matching: Vec<String> = worktree::changed_paths(repo, &[".".to_string()])?
                    .into_iter()
                    .filter(|path| wanted.contains(path))
                    .collect();
                if matching.is_empty() {
                    return Ok(0);
                }
                worktree::unstage_all(repo)?;
                worktree::stage(repo, &matching, removing)?;
                worktree::commit(repo, &message, &author)?;
                Ok(matching.len())
            })
            .await?;

        if committed == 0 {
            debug!("no matching changes, nothing committed");
        } else {
            self.status
                .update(StatusUpdate::new().with_relative_to_remote(RelativeToRemote::Ahead));
            self.refresh_local_changes(&guard).await?;
        }
        Ok(committed)
    }

    pub async fn check_uncommitted(&self) -> Result<bool> {
        let guard = self.lock.acquire().await?;
        self.refresh_local_changes(&guard).await
    }

    async fn refresh_local_changes(&self, guard: &RepoGuard) -> Result<bool> {
        let changed = self
            .changed_paths_locked(guard, vec![".".to_string()])
            .await?;
        let has_changes = !changed.is_empty();
        self.status
            .update(StatusUpdate::new().with_local_changes(has_changes));
        Ok(has_changes)
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<CommitSummary>> {
        let guard = self.lock.acquire().await?;
        self.with_repo(&guard, move |repo| worktree::history(repo, limit))
            .await
    }

    /// Arms a push for the next `synchronize()` cycle.
    pub fn request_deferred_push(&self) {
        info!("push requested for next synchronization");
        self.deferred_push.store(true, Ordering::Release);
    }

    pub fn has_deferred_push(&self) -> bool {
        self.deferred_push.load(Ordering::Acquire)
    }

    // Synchronization

    /// Runs one synchronization cycle against the remote.
    ///
    /// `claims` tells whether a changed path belongs to a managed object.
    /// Claimed changes block the cycle; unclaimed ones are discarded.
    pub async fn synchronize(&self, claims: &(dyn Fn(&str) -> bool + Sync)) -> Result<SyncOutcome> {
        if self.sync_in_flight.swap(true, Ordering::AcqRel) {
            debug!("synchronization already in flight");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let _in_flight = InFlight(&self.sync_in_flight);

        match self.prepare_sync(claims).await {
            Ok(None) => {}
            Ok(Some(outcome)) => return Ok(outcome),
            Err(err) if err.is_lock_error() => {
                debug!(error = %err, "repository busy, skipping synchronization");
                return Ok(SyncOutcome::AlreadyRunning);
            }
            Err(err) if err.failure() == Failure::Misconfigured => {
                return Ok(SyncOutcome::Misconfigured);
            }
            Err(err) => return Err(err),
        }

        let Some(guard) = self.lock.try_acquire() else {
            debug!("repository busy, skipping synchronization");
            return Ok(SyncOutcome::AlreadyRunning);
        };
        Ok(self.sync_with_remote(&guard).await)
    }

    /// Local steps: make sure a clone exists, refuse to touch pending edits,
    /// drop unmanaged changes.
    async fn prepare_sync(
        &self,
        claims: &(dyn Fn(&str) -> bool + Sync),
    ) -> Result<Option<SyncOutcome>> {
        let initialized = match self.is_initialized() {
            Ok(initialized) => initialized,
            Err(err) => {
                warn!(error = %err, "cannot determine repository state, reinitializing");
                false
            }
        };

        if !initialized {
            self.force_initialize().await?;
        } else if !self.is_using_configured_remotes().unwrap_or(false) {
            let changed = self.list_changed_paths(&["."]).await?;
            if changed.iter().any(|path| claims(path.as_str())) {
                warn!("remote settings changed while local changes are pending, not recloning");
                self.status
                    .update(StatusUpdate::new().with_local_changes(true));
                return Ok(Some(SyncOutcome::LocalChanges));
            }
            warn!("remote settings changed, recloning");
            self.force_initialize().await?;
        }

        let changed = self.list_changed_paths(&["."]).await?;
        let (claimed, orphaned): (Vec<String>, Vec<String>) =
            changed.into_iter().partition(|path| claims(path.as_str()));

        if !claimed.is_empty() {
            info!(count = claimed.len(), "local changes pending, skipping synchronization");
            self.status
                .update(StatusUpdate::new().with_local_changes(true));
            return Ok(Some(SyncOutcome::LocalChanges));
        }

        if !orphaned.is_empty() {
            warn!(paths = ?orphaned, "discarding changes to unmanaged paths");
            self.reset_paths(Some(orphaned)).await?;
        }
        self.status
            .update(StatusUpdate::new().with_local_changes(false));
        Ok(None)
    }

    /// Network steps, run under `guard`.
    async fn sync_with_remote(&self, guard: &RepoGuard) -> SyncOutcome {
        if self.settings.remote_url.trim().is_empty() || !self.settings.committer().is_complete() {
            warn!("remote URL or author identity missing");
            self.status
                .update(StatusUpdate::new().with_misconfigured(true));
            return SyncOutcome::Misconfigured;
        }

        let access = self.access();
        let probe = tokio::time::timeout(
            self.options.probe_timeout,
            self.with_repo(guard, move |repo| worktree::probe(repo, ORIGIN, &access)),
        )
        .await;
        match probe {
            Err(_) => {
                warn!(timeout = ?self.options.probe_timeout, "remote did not answer");
                self.status.update(StatusUpdate::new().with_online(false));
                return SyncOutcome::Offline;
            }
            Ok(Err(err)) if err.failure() == Failure::Unauthorized => {
                return self.record_failure(&err);
            }
            Ok(Err(err)) => {
                warn!(error = %err, "remote unreachable");
                self.status.update(StatusUpdate::new().with_online(false));
                return SyncOutcome::Offline;
            }
            Ok(Ok(())) => self.status.update(StatusUpdate::new().with_online(true)),
        }

        if self.requires_credential() && !self.has_secret() {
            info!("remote requires a credential");
            self.status
                .update(StatusUpdate::new().with_needs_credential(true));
            return SyncOutcome::NeedsCredential;
        }

        self.status.update(StatusUpdate::new().with_pulling(true));
        let pulled = self.pull_locked(guard).await;
        self.status.update(StatusUpdate::new().with_pulling(false));
        let mut ahead = match pulled {
            Ok(PullOutcome::Ahead) => true,
            Ok(outcome) => {
                debug!(?outcome, "pulled");
                false
            }
            Err(err) => return self.record_failure(&err),
        };

        if self.has_deferred_push() {
            self.status.update(StatusUpdate::new().with_pushing(true));
            let pushed = self.push_locked(guard, false).await;
            self.status.update(StatusUpdate::new().with_pushing(false));
            if let Err(err) = pushed {
                // The flag stays armed for the next externally triggered cycle.
                return self.record_failure(&err);
            }
            self.deferred_push.store(false, Ordering::Release);
            ahead = false;
        }

        self.status.update(
            StatusUpdate::new()
                .with_relative_to_remote(RelativeToRemote::Updated)
                .with_misconfigured(false)
                .with_needs_credential(false)
                .with_pulling(false)
                .with_pushing(false)
                .with_online(true)
                .with_last_synchronized(Utc::now()),
        );
        info!(unpushed_commits = ahead, "synchronized");

        // Both are full successes; `Ahead` tells the caller a push is still due.
        if ahead {
            SyncOutcome::Ahead
        } else {
            SyncOutcome::Updated
        }
    }

    fn record_failure(&self, err: &Error) -> SyncOutcome {
        match err.failure() {
            Failure::Offline => {
                warn!(error = %err, "remote unreachable");
                self.status.update(StatusUpdate::new().with_online(false));
                SyncOutcome::Offline
            }
            Failure::Unauthorized => {
                warn!(error = %err, "remote rejected credentials");
                self.clear_secret();
                self.status
                    .update(StatusUpdate::new().with_needs_credential(true));
                SyncOutcome::NeedsCredential
            }
            Failure::Diverged => {
                warn!(error = %err, "local and remote histories diverged");
                self.status.update(
                    StatusUpdate::new().with_relative_to_remote(RelativeToRemote::Diverged),
                );
                SyncOutcome::Diverged
            }
            Failure::LocalChanges => {
                warn!(error = %err, "incoming changes would overwrite local edits");
                self.status
                    .update(StatusUpdate::new().with_local_changes(true));
                SyncOutcome::LocalChanges
            }
            Failure::Misconfigured => {
                warn!(error = %err, "store is misconfigured");
                self.status
                    .update(StatusUpdate::new().with_misconfigured(true));
                SyncOutcome::Misconfigured
            }
            Failure::Other => {
                error!(error = %err, "version control operation failed");
                SyncOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatusUpdate;
    use crate::test_support::{bare_remote, options, push_files, settings};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn everything(_: &str) -> bool {
        true
    }

    fn engine(dir: &TempDir, remote: &TempDir) -> VersionControl {
        VersionControl::new(
            options(&dir.path().join("db")),
            settings(remote.path()),
            Arc::new(crate::status::TracingReporter),
        )
    }

    fn write(engine: &VersionControl, path: &str, content: &str) {
        let full = engine.working_directory().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    #[tokio::test]
    async fn test_initialize_and_detect_remote() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        let engine = engine(&dir, &remote);

        assert!(!engine.is_initialized().unwrap());
        engine.force_initialize().await.unwrap();

        assert!(engine.is_initialized().unwrap());
        assert!(engine.is_using_configured_remotes().unwrap());
        assert!(!engine.is_using_remote_urls("/elsewhere", None).unwrap());

        engine.destroy().await.unwrap();
        assert!(!engine.is_initialized().unwrap());
    }

    #[tokio::test]
    async fn test_failed_clone_removes_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("no-such-remote");
        let engine = VersionControl::new(
            options(&dir.path().join("db")),
            settings(&missing),
            Arc::new(crate::status::TracingReporter),
        );

        assert!(engine.force_initialize().await.is_err());
        assert!(!engine.working_directory().exists());
    }

    #[tokio::test]
    async fn test_stage_and_commit_without_matches() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        push_files(remote.path(), &[("seed.json", "{}")], "seed");
        let engine = engine(&dir, &remote);
        engine.force_initialize().await.unwrap();
        write(&engine, "other.json", "1");

        let committed = engine
            .stage_and_commit(&["wanted.json".to_string()], "nothing", false)
            .await
            .unwrap();

        assert_eq!(committed, 0);
        assert_eq!(engine.history(10).await.unwrap().len(), 1);
        assert_eq!(engine.list_changed_paths(&["."]).await.unwrap(), vec!["other.json"]);
    }

    #[tokio::test]
    async fn test_stage_and_commit_only_requested_paths() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        let engine = engine(&dir, &remote);
        engine.force_initialize().await.unwrap();
        write(&engine, "a.json", "1");
        write(&engine, "b.json", "2");
        // Something already staged must not leak into the commit.
        engine.stage(&["b.json".to_string()], false).await.unwrap();

        let committed = engine
            .stage_and_commit(&["a.json".to_string()], "add a", false)
            .await
            .unwrap();

        assert_eq!(committed, 1);
        assert_eq!(engine.list_changed_paths(&["."]).await.unwrap(), vec!["b.json"]);
        let history = engine.history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].summary, "add a");
        assert_eq!(history[0].author_email, "test@test.com");
        assert!(engine.status().has_local_changes);
    }

    #[tokio::test]
    async fn test_concurrent_commits_never_interleave() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        let engine = Arc::new(engine(&dir, &remote));
        engine.force_initialize().await.unwrap();

        let names: Vec<String> = (0..6).map(|i| format!("item{}.json", i)).collect();
        for name in &names {
            write(&engine, name, name);
        }

        let mut tasks = Vec::new();
        for name in names.clone() {
            let engine = Arc::clone(&engine);
            tasks.push(tokio::spawn(async move {
                engine
                    .stage_and_commit(&[name.clone()], &format!("add {}", name), false)
                    .await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 1);
        }

        assert!(engine.list_changed_paths(&["."]).await.unwrap().is_empty());
        let history = engine.history(20).await.unwrap();
        assert_eq!(history.len(), names.len());

        // Every commit carries exactly the one file it was asked to commit.
        let repo = Repository::open(engine.working_directory()).unwrap();
        for summary in history {
            let commit = repo
                .find_commit(git2::Oid::from_str(&summary.id).unwrap())
                .unwrap();
            let parent_tree = commit.parent(0).ok().map(|p| p.tree().unwrap());
            let diff = repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit.tree().unwrap()), None)
                .unwrap();
            assert_eq!(diff.deltas().len(), 1, "{}", summary.summary);
        }
    }

    #[tokio::test]
    async fn test_check_uncommitted_and_reset() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        let engine = engine(&dir, &remote);
        engine.force_initialize().await.unwrap();

        assert!(!engine.check_uncommitted().await.unwrap());
        write(&engine, "scratch.json", "x");
        assert!(engine.check_uncommitted().await.unwrap());
        assert!(engine.status().has_local_changes);

        let reset = engine.reset_paths(None).await.unwrap();
        assert_eq!(reset, vec!["scratch.json"]);
        assert!(!engine.status().has_local_changes);
    }

    #[tokio::test]
    async fn test_deferred_push_is_consumed_once() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        let engine = engine(&dir, &remote);
        engine.force_initialize().await.unwrap();
        write(&engine, "a.json", "1");
        engine
            .stage_and_commit(&["a.json".to_string()], "add a", false)
            .await
            .unwrap();

        assert_eq!(engine.status().relative_to_remote, RelativeToRemote::Ahead);
        assert_eq!(engine.synchronize(&everything).await.unwrap(), SyncOutcome::Ahead);
        assert_eq!(engine.status().relative_to_remote, RelativeToRemote::Updated);

        engine.request_deferred_push();
        assert_eq!(engine.synchronize(&everything).await.unwrap(), SyncOutcome::Updated);
        assert!(!engine.has_deferred_push());

        let bare = Repository::open_bare(remote.path()).unwrap();
        let head = engine.history(1).await.unwrap().remove(0);
        assert_eq!(bare.refname_to_id("refs/heads/main").unwrap().to_string(), head.id);
    }

    #[tokio::test]
    async fn test_sync_is_not_queued_while_locked() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        let engine = engine(&dir, &remote);
        engine.force_initialize().await.unwrap();

        let _held = engine.lock.acquire().await.unwrap();
        assert_eq!(
            engine.synchronize(&everything).await.unwrap(),
            SyncOutcome::AlreadyRunning
        );
    }

    #[tokio::test]
    async fn test_abandoned_job_keeps_the_lock() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        let engine = engine(&dir, &remote);
        engine.force_initialize().await.unwrap();

        let guard = engine.lock.acquire().await.unwrap();
        let slow = engine.with_repo(&guard, |_repo| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), slow)
            .await
            .is_err());
        drop(guard);

        // The job is still running on the blocking pool.
        assert!(engine.lock.try_acquire().is_none());
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(engine.lock.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_pull_refuses_to_overwrite_edits() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        push_files(remote.path(), &[("a.json", "1")], "one");
        let engine = engine(&dir, &remote);
        engine.force_initialize().await.unwrap();
        write(&engine, "a.json", "mine");
        push_files(remote.path(), &[("a.json", "2")], "two");

        assert!(matches!(engine.pull().await, Err(Error::LocalChanges(_))));
        assert_eq!(
            std::fs::read_to_string(engine.working_directory().join("a.json")).unwrap(),
            "mine"
        );

        engine.reset_paths(None).await.unwrap();
        assert_eq!(engine.pull().await.unwrap(), PullOutcome::FastForwarded);
        assert_eq!(
            std::fs::read_to_string(engine.working_directory().join("a.json")).unwrap(),
            "2"
        );
    }

    #[tokio::test]
    async fn test_fetch_origin_and_upstream() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        let upstream = bare_remote();
        let upstream_url = upstream.path().to_string_lossy().into_owned();
        let engine = VersionControl::new(
            options(&dir.path().join("db")).with_upstream_url(upstream_url.clone()),
            settings(remote.path()),
            Arc::new(crate::status::TracingReporter),
        );
        engine.force_initialize().await.unwrap();

        let origin_url = remote.path().to_string_lossy().into_owned();
        assert!(engine
            .is_using_remote_urls(&origin_url, Some(&upstream_url))
            .unwrap());
        assert!(!engine.is_using_remote_urls(&origin_url, Some("/elsewhere")).unwrap());

        assert!(!engine.fetch_upstream().await.unwrap());
        assert!(!engine.fetch_remote().await.unwrap());

        push_files(upstream.path(), &[("up.json", "1")], "upstream work");
        assert!(engine.fetch_upstream().await.unwrap());
        assert!(!engine.fetch_remote().await.unwrap());

        push_files(remote.path(), &[("a.json", "1")], "origin work");
        assert!(engine.fetch_remote().await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_upstream_without_upstream_is_misconfigured() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        let engine = engine(&dir, &remote);
        engine.force_initialize().await.unwrap();

        assert!(matches!(
            engine.fetch_upstream().await,
            Err(Error::Misconfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_force_push_replaces_remote_history() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        push_files(remote.path(), &[("a.json", "1")], "seed");
        let engine = engine(&dir, &remote);
        engine.force_initialize().await.unwrap();

        push_files(remote.path(), &[("b.json", "2")], "peer work");
        write(&engine, "c.json", "3");
        engine
            .stage_and_commit(&["c.json".to_string()], "local work", false)
            .await
            .unwrap();
        assert!(engine.fetch_remote().await.unwrap());

        assert!(engine.push(false).await.is_err());
        engine.push(true).await.unwrap();

        let bare = Repository::open_bare(remote.path()).unwrap();
        let head = engine.history(1).await.unwrap().remove(0);
        assert_eq!(bare.refname_to_id("refs/heads/main").unwrap().to_string(), head.id);
    }

    #[tokio::test]
    async fn test_default_clone_depth_against_local_remote() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        push_files(remote.path(), &[("a.json", "1")], "one");
        push_files(remote.path(), &[("b.json", "2")], "two");
        let engine = VersionControl::new(
            options(&dir.path().join("db")).with_clone_depth(Some(1)),
            settings(remote.path()),
            Arc::new(crate::status::TracingReporter),
        );

        engine.force_initialize().await.unwrap();

        assert_eq!(engine.history(10).await.unwrap().len(), 2);
        assert_eq!(engine.synchronize(&everything).await.unwrap(), SyncOutcome::Updated);
    }

    #[tokio::test]
    async fn test_changed_remote_with_claimed_edits_is_not_recloned() {
        let dir = TempDir::new().unwrap();
        let first = bare_remote();
        let second = bare_remote();
        push_files(second.path(), &[("other.json", "1")], "other");
        engine(&dir, &first).force_initialize().await.unwrap();

        let moved = engine(&dir, &second);
        write(&moved, "pending.json", "keep");

        assert_eq!(
            moved.synchronize(&everything).await.unwrap(),
            SyncOutcome::LocalChanges
        );
        assert!(moved.working_directory().join("pending.json").is_file());
        assert!(!moved.is_using_configured_remotes().unwrap());
        assert!(moved.status().has_local_changes);

        let nothing_claimed = |_: &str| false;
        assert_eq!(
            moved.synchronize(&nothing_claimed).await.unwrap(),
            SyncOutcome::Updated
        );
        assert!(moved.is_using_configured_remotes().unwrap());
        assert!(!moved.working_directory().join("pending.json").exists());
        assert!(moved.working_directory().join("other.json").is_file());
    }

    /// Answers every request with the advertisement of an empty repository.
    async fn serve_empty_smart_http() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let body: &[u8] = b"001e# service=git-upload-pack\n0000\
                003e0000000000000000000000000000000000000000 capabilities^{}\0\n0000";
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = format!(
                        "HTTP/1.1 200 OK\r\n\
                         Content-Type: application/x-git-upload-pack-advertisement\r\n\
                         Content-Length: {}\r\n\
                         Connection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}/db.git", addr)
    }

    #[tokio::test]
    async fn test_http_remote_without_secret_needs_credential() {
        let dir = TempDir::new().unwrap();
        let url = serve_empty_smart_http().await;
        let workdir = dir.path().join("db");
        {
            let mut init = git2::RepositoryInitOptions::new();
            init.initial_head("main");
            let repo = Repository::init_opts(&workdir, &init).unwrap();
            repo.remote(ORIGIN, &url).unwrap();
        }
        let mut remote_settings = settings(dir.path());
        remote_settings.remote_url = url;
        let engine = VersionControl::new(
            options(&workdir),
            remote_settings,
            Arc::new(crate::status::TracingReporter),
        );

        assert_eq!(
            engine.synchronize(&everything).await.unwrap(),
            SyncOutcome::NeedsCredential
        );
        let status = engine.status();
        assert!(status.is_online);
        assert!(status.needs_credential);
        assert!(status.last_synchronized.is_none());
    }

    #[tokio::test]
    async fn test_https_remote_requires_credential() {
        let dir = TempDir::new().unwrap();
        let mut remote_settings = settings(dir.path());
        remote_settings.remote_url = "https://example.invalid/db.git".into();
        let engine = VersionControl::new(
            options(&dir.path().join("db")),
            remote_settings,
            Arc::new(crate::status::TracingReporter),
        );

        assert!(engine.requires_credential());
        assert!(!engine.has_secret());
        engine.set_credential(Some(Credential::new("alice").with_secret("token")));
        assert!(engine.has_secret());

        let failure = engine.record_failure(&Error::Git(git2::Error::new(
            ErrorCode::Auth,
            git2::ErrorClass::Http,
            "authentication required",
        )));
        assert_eq!(failure, SyncOutcome::NeedsCredential);
        assert!(!engine.has_secret());
        assert_eq!(engine.credential().unwrap().identity, "alice");
        assert!(engine.status().needs_credential);
    }

    #[tokio::test]
    async fn test_status_updates_are_merged() {
        let dir = TempDir::new().unwrap();
        let remote = bare_remote();
        let seen = Arc::new(Mutex::new(Vec::<StatusUpdate>::new()));
        let sink = Arc::clone(&seen);
        let engine = VersionControl::new(
            options(&dir.path().join("db")),
            settings(remote.path()),
            Arc::new(move |update: &StatusUpdate| sink.lock().unwrap().push(update.clone())),
        );
        engine.force_initialize().await.unwrap();

        engine.synchronize(&everything).await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|u| u.is_pulling == Some(true)));
        assert!(seen.iter().all(|u| !u.is_empty()));
        let status = engine.status();
        assert!(!status.is_pulling);
        assert!(status.is_online);
        assert!(status.last_synchronized.is_some());
    }
}
