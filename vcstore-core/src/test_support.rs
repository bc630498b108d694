//! Fixtures shared by the unit tests: bare remotes, a stand-in peer that
//! publishes commits straight into them, and store constructors.

use crate::config::{LockOptions, RemoteSettings, StoreOptions};
use crate::models::Committer;
use crate::status::TracingReporter;
use crate::store::ObjectStore;
use git2::{Commit, Oid, Repository, RepositoryInitOptions, Signature, Tree};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub(crate) fn author() -> Committer {
    Committer {
        name: "Test".to_string(),
        email: "test@test.com".to_string(),
    }
}

pub(crate) fn bare_remote() -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut opts = RepositoryInitOptions::new();
    opts.bare(true).initial_head("main");
    Repository::init_opts(dir.path(), &opts).unwrap();
    dir
}

fn insert(repo: &Repository, base: Option<&Tree>, path: &str, blob: Oid) -> Oid {
    let mut builder = repo.treebuilder(base).unwrap();
    match path.split_once('/') {
        None => {
            builder.insert(path, blob, 0o100644).unwrap();
        }
        Some((dir, rest)) => {
            let existing = base
                .and_then(|tree| tree.get_name(dir))
                .and_then(|entry| entry.to_object(repo).ok())
                .and_then(|object| object.into_tree().ok());
            let subtree = insert(repo, existing.as_ref(), rest, blob);
            builder.insert(dir, subtree, 0o040000).unwrap();
        }
    }
    builder.write().unwrap()
}

/// Commits `files` on top of the remote's `main` as another peer would.
pub(crate) fn push_files(remote: &Path, files: &[(&str, &str)], message: &str) -> Oid {
    let repo = Repository::open_bare(remote).unwrap();
    let parent: Option<Commit> = repo
        .refname_to_id("refs/heads/main")
        .ok()
        .map(|oid| repo.find_commit(oid).unwrap());

    let mut tree = parent.as_ref().map(|commit| commit.tree().unwrap());
    for (path, content) in files {
        let blob = repo.blob(content.as_bytes()).unwrap();
        let oid = insert(&repo, tree.as_ref(), path, blob);
        tree = Some(repo.find_tree(oid).unwrap());
    }
    let tree = tree.expect("push_files needs at least one file");

    let signature = Signature::now("Peer", "peer@test.com").unwrap();
    let parents: Vec<&Commit> = parent.iter().collect();
    let oid = repo
        .commit(None, &signature, &signature, message, &tree, &parents)
        .unwrap();
    repo.reference("refs/heads/main", oid, true, message).unwrap();
    oid
}

/// Full clones and short timeouts; shallow fetches over the local transport
/// are not what these tests exercise.
pub(crate) fn options(workdir: &Path) -> StoreOptions {
    StoreOptions::new(workdir)
        .with_clone_depth(None)
        .with_probe_timeout(Duration::from_secs(5))
        .with_lock_options(LockOptions {
            timeout: Duration::from_secs(5),
            max_pending: 8,
        })
}

pub(crate) fn settings(remote: &Path) -> RemoteSettings {
    let author = author();
    RemoteSettings {
        remote_url: remote.to_string_lossy().into_owned(),
        identity: String::new(),
        author_name: author.name,
        author_email: author.email,
    }
}

pub(crate) fn open_store(dir: &TempDir, remote: &TempDir) -> ObjectStore {
    ObjectStore::with_json_store(
        options(&dir.path().join("db")),
        settings(remote.path()),
        Arc::new(TracingReporter),
    )
}
