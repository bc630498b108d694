use crate::config::LockOptions;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The single mutual-exclusion lock guarding a working directory.
///
/// Acquisition is bounded by a timeout and by the number of callers allowed
/// to wait at once.
pub struct RepoLock {
    mutex: Arc<Mutex<()>>,
    pending: AtomicUsize,
    options: LockOptions,
}

/// Proof that the repository lock is held.
///
/// Clones share the same hold; the lock is released when the last clone is
/// dropped. Blocking jobs carry a clone so the lock outlives a caller that
/// stops waiting for them.
#[derive(Clone)]
pub struct RepoGuard(Arc<OwnedMutexGuard<()>>);

impl RepoGuard {
    fn new(guard: OwnedMutexGuard<()>) -> Self {
        Self(Arc::new(guard))
    }
}

struct PendingSlot<'a>(&'a AtomicUsize);

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl RepoLock {
    pub fn new(options: LockOptions) -> Self {
        Self {
            mutex: Arc::new(Mutex::new(())),
            pending: AtomicUsize::new(0),
            options,
        }
    }

    pub async fn acquire(&self) -> Result<RepoGuard> {
        if let Some(guard) = self.try_acquire() {
            return Ok(guard);
        }

        let queued = self.pending.fetch_add(1, Ordering::AcqRel);
        let _slot = PendingSlot(&self.pending);
        if queued >= self.options.max_pending {
            return Err(Error::LockContended);
        }

        tokio::time::timeout(self.options.timeout, Arc::clone(&self.mutex).lock_owned())
            .await
            .map(RepoGuard::new)
            .map_err(|_| Error::LockTimeout)
    }

    pub fn try_acquire(&self) -> Option<RepoGuard> {
        Arc::clone(&self.mutex)
            .try_lock_owned()
            .ok()
            .map(RepoGuard::new)
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}
