//! Blocking git2 plumbing for a single working directory.
//!
//! Nothing here takes the repository lock; callers in `engine` hold it and run
//! these functions on the blocking pool.

use crate::error::{Error, Result};
use crate::models::{CommitSummary, Committer, PullOutcome};
use chrono::{DateTime, Utc};
use git2::build::CheckoutBuilder;
use git2::{
    Commit, Cred, Direction, ErrorClass, ErrorCode, FetchOptions, ObjectType, Oid,
    ProxyOptions, PushOptions, RemoteCallbacks, Repository, RepositoryInitOptions, Signature,
    Status, StatusOptions,
};
use std::cell::RefCell;
use std::path::Path;
use tracing::{debug, info};

pub(crate) const ORIGIN: &str = "origin";
pub(crate) const UPSTREAM: &str = "upstream";

/// Credentials and proxy settings for one network operation.
#[derive(Clone, Default)]
pub(crate) struct RemoteAccess {
    pub username: Option<String>,
    pub secret: Option<String>,
    pub proxy_url: Option<String>,
}

impl RemoteAccess {
    pub(crate) fn callbacks<'a>(&self) -> RemoteCallbacks<'a> {
        let username = self.username.clone();
        let secret = self.secret.clone();
        let mut attempts = 0u32;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, username_from_url, allowed| {
            // libgit2 keeps asking after a rejection; one try per operation.
            attempts += 1;
            if attempts > 1 {
                return Err(git2::Error::new(
                    ErrorCode::Auth,
                    ErrorClass::Http,
                    "authentication rejected by remote",
                ));
            }

            let user = username
                .as_deref()
                .or(username_from_url)
                .unwrap_or("git");
            if allowed.is_user_pass_plaintext() {
                if let Some(secret) = &secret {
                    return Cred::userpass_plaintext(user, secret);
                }
            }
            if allowed.is_ssh_key() {
                return Cred::ssh_key_from_agent(user);
            }
            if allowed.is_username() {
                return Cred::username(user);
            }
            Cred::default()
        });
        callbacks
    }

    pub(crate) fn proxy<'a>(&self) -> ProxyOptions<'a> {
        let mut proxy = ProxyOptions::new();
        match &self.proxy_url {
            Some(url) => {
                proxy.url(url);
            }
            None => {
                proxy.auto();
            }
        }
        proxy
    }

    fn fetch_options<'a>(&self, depth: Option<u32>) -> FetchOptions<'a> {
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.callbacks());
        options.proxy_options(self.proxy());
        if let Some(depth) = depth {
            options.depth(depth as i32);
        }
        options
    }
}

pub(crate) fn open(workdir: &Path) -> Result<Repository> {
    Ok(Repository::open(workdir)?)
}

fn branch_ref(branch: &str) -> String {
    format!("refs/heads/{}", branch)
}

fn tracking_ref(remote: &str, branch: &str) -> String {
    format!("refs/remotes/{}/{}", remote, branch)
}

/// Shallow history is only requested from network remotes; the local
/// transport cannot serve it.
pub(crate) fn effective_depth(url: &str, depth: Option<u32>) -> Option<u32> {
    let url = url.to_ascii_lowercase();
    let network = match url.split_once("://") {
        Some((scheme, _)) => scheme != "file",
        // scp-like `user@host:path`
        None => url.contains('@') && url.contains(':'),
    };
    depth.filter(|_| network)
}

fn optional_oid(repo: &Repository, name: &str) -> Result<Option<Oid>> {
    match repo.refname_to_id(name) {
        Ok(oid) => Ok(Some(oid)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn remote_url(repo: &Repository, name: &str) -> Result<Option<String>> {
    match repo.find_remote(name) {
        Ok(remote) => Ok(remote.url().map(str::to_string)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Creates a repository on `branch`, wires up the remotes and checks out the
/// remote branch when it exists. An empty remote leaves the branch unborn.
pub(crate) fn clone_into(
    workdir: &Path,
    remote_url: &str,
    upstream_url: Option<&str>,
    branch: &str,
    depth: Option<u32>,
    access: &RemoteAccess,
) -> Result<()> {
    std::fs::create_dir_all(workdir)?;

    let mut init = RepositoryInitOptions::new();
    init.initial_head(branch).no_reinit(true);
    let repo = Repository::init_opts(workdir, &init)?;
    repo.remote(ORIGIN, remote_url)?;

    let depth = effective_depth(remote_url, depth);
    if fetch_branch(&repo, ORIGIN, branch, depth, access)? {
        let oid = repo.refname_to_id(&tracking_ref(ORIGIN, branch))?;
        let commit = repo.find_commit(oid)?;
        let mut local = repo.branch(branch, &commit, true)?;
        local.set_upstream(Some(&format!("{}/{}", ORIGIN, branch)))?;
        repo.set_head(&branch_ref(branch))?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        info!(%oid, "checked out {}", branch);
    } else {
        info!("remote has no {} branch yet", branch);
    }

    if let Some(url) = upstream_url {
        repo.remote(UPSTREAM, url)?;
    }
    Ok(())
}

/// Connects to `remote` without transferring objects.
pub(crate) fn probe(repo: &Repository, remote: &str, access: &RemoteAccess) -> Result<()> {
    let mut remote = repo.find_remote(remote)?;
    let connection =
        remote.connect_auth(Direction::Fetch, Some(access.callbacks()), Some(access.proxy()))?;
    drop(connection);
    Ok(())
}

/// Fetches `branch` into its remote-tracking ref. Returns `false` when the
/// remote does not have the branch.
pub(crate) fn fetch_branch(
    repo: &Repository,
    remote: &str,
    branch: &str,
    depth: Option<u32>,
    access: &RemoteAccess,
) -> Result<bool> {
    let mut handle = repo.find_remote(remote)?;
    let tracking = tracking_ref(remote, branch);

    // A refspec naming a branch the remote lacks matches nothing.
    let refspec = format!("+{}:{}", branch_ref(branch), tracking);
    let mut options = access.fetch_options(depth);
    handle.fetch(&[refspec.as_str()], Some(&mut options), None)?;

    let present = optional_oid(repo, &tracking)?.is_some();
    debug!(remote, branch, present, "fetched");
    Ok(present)
}

/// Checks out `target` without touching files that differ from HEAD.
fn checkout_safely(repo: &Repository, target: &Commit<'_>) -> Result<()> {
    let mut checkout = CheckoutBuilder::new();
    checkout.safe();
    repo.checkout_tree(target.as_object(), Some(&mut checkout))
        .map_err(|e| match e.code() {
            ErrorCode::Conflict => Error::LocalChanges(e.message().to_string()),
            _ => Error::Git(e),
        })
}

/// Moves the local branch to the fetched remote tip when that is a
/// fast-forward. Never merges, and never overwrites uncommitted edits.
pub(crate) fn fast_forward(repo: &Repository, branch: &str) -> Result<PullOutcome> {
    let local_ref = branch_ref(branch);
    let local_oid = optional_oid(repo, &local_ref)?;
    let Some(remote_oid) = optional_oid(repo, &tracking_ref(ORIGIN, branch))? else {
        // Nothing published yet.
        return Ok(match local_oid {
            Some(_) => PullOutcome::Ahead,
            None => PullOutcome::UpToDate,
        });
    };

    match local_oid {
        None => {
            let target = repo.find_commit(remote_oid)?;
            checkout_safely(repo, &target)?;
            repo.reference(&local_ref, remote_oid, true, "vcstore: initial checkout")?;
            repo.set_head(&local_ref)?;
            Ok(PullOutcome::FastForwarded)
        }
        Some(local) if local == remote_oid => Ok(PullOutcome::UpToDate),
        Some(local) if repo.graph_descendant_of(remote_oid, local)? => {
            let target = repo.find_commit(remote_oid)?;
            checkout_safely(repo, &target)?;
            repo.reference(&local_ref, remote_oid, true, "vcstore: fast-forward")?;
            info!(from = %local, to = %remote_oid, "fast-forwarded");
            Ok(PullOutcome::FastForwarded)
        }
        Some(local) if repo.graph_descendant_of(local, remote_oid)? => Ok(PullOutcome::Ahead),
        Some(_) => Err(Error::NonFastForward),
    }
}

pub(crate) fn push(repo: &Repository, branch: &str, force: bool, access: &RemoteAccess) -> Result<()> {
    let local_ref = branch_ref(branch);
    if optional_oid(repo, &local_ref)?.is_none() {
        debug!("nothing to push from an unborn branch");
        return Ok(());
    }

    let mut remote = repo.find_remote(ORIGIN)?;
    let refspec = if force {
        format!("+{}:{}", local_ref, local_ref)
    } else {
        format!("{}:{}", local_ref, local_ref)
    };

    let rejection: RefCell<Option<String>> = RefCell::new(None);
    {
        let mut callbacks = access.callbacks();
        callbacks.push_update_reference(|_name, status| {
            if let Some(message) = status {
                *rejection.borrow_mut() = Some(message.to_string());
            }
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        options.proxy_options(access.proxy());
        remote.push(&[refspec.as_str()], Some(&mut options))?;
    }

    if let Some(message) = rejection.into_inner() {
        return Err(Error::PushRejected(message));
    }

    // Keep the tracking ref in step so the next pull sees us as up to date.
    let oid = repo.refname_to_id(&local_ref)?;
    repo.reference(&tracking_ref(ORIGIN, branch), oid, true, "vcstore: push")?;
    info!(%oid, force, "pushed {}", branch);
    Ok(())
}

fn is_visible(path: &str) -> bool {
    !path.starts_with('/')
        && path
            .split('/')
            .all(|part| !part.is_empty() && part != ".." && !part.starts_with('.'))
}

/// Paths whose working-tree or index state differs from HEAD.
pub(crate) fn changed_paths(repo: &Repository, scopes: &[String]) -> Result<Vec<String>> {
    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false)
        .renames_head_to_index(false);
    for scope in scopes {
        let scope = scope.trim_matches('/');
        if !scope.is_empty() && scope != "." {
            options.pathspec(scope);
        }
    }

    let statuses = repo.statuses(Some(&mut options))?;
    let mut paths: Vec<String> = statuses
        .iter()
        .filter(|entry| entry.status() != Status::CURRENT && !entry.status().is_ignored())
        .filter_map(|entry| entry.path().map(str::to_string))
        .filter(|path| is_visible(path))
        .collect();
    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// Resets the index to HEAD, leaving the working tree alone.
pub(crate) fn unstage_all(repo: &Repository) -> Result<()> {
    let mut index = repo.index()?;
    match head_commit(repo)? {
        Some(commit) => index.read_tree(&commit.tree()?)?,
        None => index.clear()?,
    }
    index.write()?;
    Ok(())
}

pub(crate) fn stage(repo: &Repository, paths: &[String], removing: bool) -> Result<()> {
    let workdir = repo
        .workdir()
        .ok_or_else(|| Error::InvalidOperation("repository has no working tree".into()))?
        .to_path_buf();
    let mut index = repo.index()?;

    for path in paths {
        let relative = Path::new(path);
        if removing || !workdir.join(relative).exists() {
            match index.remove_path(relative) {
                Ok(()) => {}
                Err(e) if e.code() == ErrorCode::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            index.add_path(relative)?;
        }
    }

    index.write()?;
    Ok(())
}

pub(crate) fn commit(repo: &Repository, message: &str, author: &Committer) -> Result<Oid> {
    if !author.is_complete() {
        return Err(Error::Misconfigured("author name and email".into()));
    }

    let signature = Signature::now(&author.name, &author.email)?;
    let mut index = repo.index()?;
    let tree_oid = index.write_tree()?;
    let tree = repo.find_tree(tree_oid)?;
    let parent = head_commit(repo)?;
    let parents: Vec<&Commit<'_>> = parent.iter().collect();

    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    info!(%oid, "committed: {}", message);
    Ok(oid)
}

/// Restores the given paths to their HEAD state, deleting files HEAD does not
/// know about. Paths are taken literally, never as patterns.
pub(crate) fn reset_paths(repo: &Repository, paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        return Ok(());
    }
    let workdir = repo
        .workdir()
        .ok_or_else(|| Error::InvalidOperation("repository has no working tree".into()))?
        .to_path_buf();

    let tree = match head_commit(repo)? {
        Some(commit) => Some(commit.tree()?),
        None => None,
    };

    let mut index = repo.index()?;
    for path in paths {
        let relative = Path::new(path);
        let full = workdir.join(relative);
        let blob = match &tree {
            Some(tree) => match tree.get_path(relative) {
                Ok(entry) if entry.kind() == Some(ObjectType::Blob) => {
                    Some(repo.find_blob(entry.id())?)
                }
                Ok(_) => None,
                Err(e) if e.code() == ErrorCode::NotFound => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        match blob {
            Some(blob) => {
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&full, blob.content())?;
                index.add_path(relative)?;
            }
            None => {
                match index.remove_path(relative) {
                    Ok(()) => {}
                    Err(e) if e.code() == ErrorCode::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                if full.is_file() {
                    std::fs::remove_file(&full)?;
                }
            }
        }
    }
    index.write()?;

    debug!(count = paths.len(), "reset paths");
    Ok(())
}

/// Content of `path` as of `revision`, or `None` if it did not exist then.
pub(crate) fn blob_at(repo: &Repository, path: &str, revision: &str) -> Result<Option<Vec<u8>>> {
    let object = repo.revparse_single(revision).map_err(|e| match e.code() {
        ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec => {
            Error::RevisionNotFound(revision.to_string())
        }
        _ => Error::Git(e),
    })?;
    let tree = object.peel_to_commit()?.tree()?;

    match tree.get_path(Path::new(path)) {
        Ok(entry) => {
            let blob = repo.find_blob(entry.id())?;
            Ok(Some(blob.content().to_vec()))
        }
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Newest-first commit summaries reachable from HEAD.
pub(crate) fn history(repo: &Repository, limit: usize) -> Result<Vec<CommitSummary>> {
    if head_commit(repo)?.is_none() {
        return Ok(Vec::new());
    }

    let mut walk = repo.revwalk()?;
    walk.push_head()?;

    let mut commits = Vec::new();
    for oid in walk.take(limit) {
        let commit = repo.find_commit(oid?)?;
        let author = commit.author();
        commits.push(CommitSummary {
            id: commit.id().to_string(),
            summary: commit.summary().unwrap_or_default().to_string(),
            author_name: author.name().unwrap_or_default().to_string(),
            author_email: author.email().unwrap_or_default().to_string(),
            timestamp: DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
                .unwrap_or_default(),
        });
    }
    Ok(commits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{author, bare_remote, push_files};
    use tempfile::TempDir;

    fn clone(remote: &Path) -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let workdir = dir.path().join("db");
        clone_into(
            &workdir,
            remote.to_str().unwrap(),
            None,
            "main",
            None,
            &RemoteAccess::default(),
        )
        .unwrap();
        let repo = open(&workdir).unwrap();
        (dir, repo)
    }

    fn write(repo: &Repository, path: &str, content: &str) {
        let full = repo.workdir().unwrap().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    #[test]
    fn test_clone_empty_remote_leaves_unborn_branch() {
        let remote = bare_remote();
        let (_dir, repo) = clone(remote.path());

        assert!(head_commit(&repo).unwrap().is_none());
        assert_eq!(
            remote_url(&repo, ORIGIN).unwrap().as_deref(),
            remote.path().to_str()
        );
        assert!(history(&repo, 10).unwrap().is_empty());
    }

    #[test]
    fn test_clone_checks_out_remote_branch() {
        let remote = bare_remote();
        push_files(remote.path(), &[("a.json", "{}\n")], "seed");
        let (_dir, repo) = clone(remote.path());

        assert!(repo.workdir().unwrap().join("a.json").is_file());
        assert_eq!(history(&repo, 10).unwrap()[0].summary, "seed");
    }

    #[test]
    fn test_changed_paths_hide_dotfiles() {
        let remote = bare_remote();
        let (_dir, repo) = clone(remote.path());
        write(&repo, "notes/a.json", "{}");
        write(&repo, ".cache/x", "1");
        write(&repo, "notes/.a.json.tmp", "{}");

        assert_eq!(changed_paths(&repo, &[".".into()]).unwrap(), vec!["notes/a.json"]);
        assert!(changed_paths(&repo, &["people".into()]).unwrap().is_empty());
    }

    #[test]
    fn test_stage_commit_and_read_back() {
        let remote = bare_remote();
        let (_dir, repo) = clone(remote.path());
        write(&repo, "a.json", "1");
        write(&repo, "b.json", "2");

        stage(&repo, &["a.json".into()], false).unwrap();
        let first = commit(&repo, "add a", &author()).unwrap();

        assert_eq!(changed_paths(&repo, &[".".into()]).unwrap(), vec!["b.json"]);
        assert_eq!(
            blob_at(&repo, "a.json", &first.to_string()).unwrap(),
            Some(b"1".to_vec())
        );
        assert_eq!(blob_at(&repo, "b.json", "HEAD").unwrap(), None);
        assert!(matches!(
            blob_at(&repo, "a.json", "no-such-rev"),
            Err(Error::RevisionNotFound(_))
        ));
    }

    #[test]
    fn test_commit_requires_author() {
        let remote = bare_remote();
        let (_dir, repo) = clone(remote.path());
        let nobody = Committer {
            name: String::new(),
            email: String::new(),
        };

        assert!(matches!(commit(&repo, "x", &nobody), Err(Error::Misconfigured(_))));
    }

    #[test]
    fn test_reset_paths_restores_and_removes() {
        let remote = bare_remote();
        push_files(remote.path(), &[("kept.json", "old")], "seed");
        let (_dir, repo) = clone(remote.path());
        write(&repo, "kept.json", "new");
        write(&repo, "fresh.json", "new");
        stage(&repo, &["fresh.json".into()], false).unwrap();

        reset_paths(&repo, &["kept.json".into(), "fresh.json".into()]).unwrap();

        let workdir = repo.workdir().unwrap();
        assert_eq!(std::fs::read_to_string(workdir.join("kept.json")).unwrap(), "old");
        assert!(!workdir.join("fresh.json").exists());
        assert!(changed_paths(&repo, &[".".into()]).unwrap().is_empty());
    }

    #[test]
    fn test_unstage_all_keeps_working_tree() {
        let remote = bare_remote();
        let (_dir, repo) = clone(remote.path());
        write(&repo, "a.json", "1");
        stage(&repo, &["a.json".into()], false).unwrap();

        unstage_all(&repo).unwrap();

        assert!(repo.index().unwrap().is_empty());
        assert_eq!(changed_paths(&repo, &[".".into()]).unwrap(), vec!["a.json"]);
    }

    #[test]
    fn test_fast_forward_and_divergence() {
        let remote = bare_remote();
        push_files(remote.path(), &[("a.json", "1")], "one");
        let (_dir, repo) = clone(remote.path());
        let access = RemoteAccess::default();

        push_files(remote.path(), &[("b.json", "2")], "two");
        assert!(fetch_branch(&repo, ORIGIN, "main", None, &access).unwrap());
        assert_eq!(fast_forward(&repo, "main").unwrap(), PullOutcome::FastForwarded);
        assert!(repo.workdir().unwrap().join("b.json").is_file());
        assert_eq!(fast_forward(&repo, "main").unwrap(), PullOutcome::UpToDate);

        write(&repo, "c.json", "3");
        stage(&repo, &["c.json".into()], false).unwrap();
        commit(&repo, "three", &author()).unwrap();
        assert_eq!(fast_forward(&repo, "main").unwrap(), PullOutcome::Ahead);

        push_files(remote.path(), &[("d.json", "4")], "four");
        fetch_branch(&repo, ORIGIN, "main", None, &access).unwrap();
        assert!(matches!(fast_forward(&repo, "main"), Err(Error::NonFastForward)));
    }

    #[test]
    fn test_push_publishes_branch() {
        let remote = bare_remote();
        let (_dir, repo) = clone(remote.path());
        let access = RemoteAccess::default();

        push(&repo, "main", false, &access).unwrap();
        write(&repo, "a.json", "1");
        stage(&repo, &["a.json".into()], false).unwrap();
        let oid = commit(&repo, "first", &author()).unwrap();
        push(&repo, "main", false, &access).unwrap();

        let bare = Repository::open_bare(remote.path()).unwrap();
        assert_eq!(bare.refname_to_id("refs/heads/main").unwrap(), oid);
        assert_eq!(fast_forward(&repo, "main").unwrap(), PullOutcome::UpToDate);
    }

    #[test]
    fn test_fetch_from_empty_remote() {
        let remote = bare_remote();
        let (_dir, repo) = clone(remote.path());
        let access = RemoteAccess::default();

        assert!(!fetch_branch(&repo, ORIGIN, "main", None, &access).unwrap());
        assert_eq!(fast_forward(&repo, "main").unwrap(), PullOutcome::UpToDate);

        push_files(remote.path(), &[("a.json", "1")], "first");
        assert!(fetch_branch(&repo, ORIGIN, "main", None, &access).unwrap());
        assert_eq!(fast_forward(&repo, "main").unwrap(), PullOutcome::FastForwarded);
        assert!(repo.workdir().unwrap().join("a.json").is_file());
    }

    #[test]
    fn test_reset_paths_takes_names_literally() {
        let remote = bare_remote();
        push_files(
            remote.path(),
            &[("notes/[ab].json", "bracket"), ("notes/a.json", "plain")],
            "seed",
        );
        let (_dir, repo) = clone(remote.path());
        write(&repo, "notes/[ab].json", "edited");
        write(&repo, "notes/a.json", "edited");

        reset_paths(&repo, &["notes/[ab].json".into()]).unwrap();

        let workdir = repo.workdir().unwrap();
        assert_eq!(
            std::fs::read_to_string(workdir.join("notes/[ab].json")).unwrap(),
            "bracket"
        );
        assert_eq!(
            std::fs::read_to_string(workdir.join("notes/a.json")).unwrap(),
            "edited"
        );
        assert_eq!(changed_paths(&repo, &[".".into()]).unwrap(), vec!["notes/a.json"]);
    }

    #[test]
    fn test_fast_forward_keeps_uncommitted_edits() {
        let remote = bare_remote();
        push_files(remote.path(), &[("a.json", "1")], "one");
        let (_dir, repo) = clone(remote.path());
        let before = repo.refname_to_id("refs/heads/main").unwrap();
        write(&repo, "a.json", "mine");

        push_files(remote.path(), &[("a.json", "2")], "two");
        fetch_branch(&repo, ORIGIN, "main", None, &RemoteAccess::default()).unwrap();

        assert!(matches!(fast_forward(&repo, "main"), Err(Error::LocalChanges(_))));
        assert_eq!(
            std::fs::read_to_string(repo.workdir().unwrap().join("a.json")).unwrap(),
            "mine"
        );
        assert_eq!(repo.refname_to_id("refs/heads/main").unwrap(), before);
    }

    #[test]
    fn test_shallow_depth_only_for_network_remotes() {
        assert_eq!(effective_depth("https://example.com/db.git", Some(1)), Some(1));
        assert_eq!(effective_depth("git@example.com:team/db.git", Some(1)), Some(1));
        assert_eq!(effective_depth("file:///srv/db.git", Some(1)), None);
        assert_eq!(effective_depth("/srv/db.git", Some(1)), None);
        assert_eq!(effective_depth("https://example.com/db.git", None), None);
    }

    #[test]
    fn test_is_visible() {
        assert!(is_visible("notes/a.json"));
        assert!(!is_visible(".git/config"));
        assert!(!is_visible("notes/.hidden"));
        assert!(!is_visible("../escape"));
    }
}
