use crate::models::{StatusSnapshot, StatusUpdate};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

/// Receives every partial status change. Consumers merge partials into their
/// own view.
pub trait StatusReporter: Send + Sync {
    fn report(&self, update: &StatusUpdate);
}

impl<F> StatusReporter for F
where
    F: Fn(&StatusUpdate) + Send + Sync,
{
    fn report(&self, update: &StatusUpdate) {
        self(update)
    }
}

pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn report(&self, update: &StatusUpdate) {
        debug!(?update, "status changed");
    }
}

/// Fans status updates out to any number of subscribers.
pub struct BroadcastReporter {
    tx: broadcast::Sender<StatusUpdate>,
}

impl BroadcastReporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }
}

impl StatusReporter for BroadcastReporter {
    fn report(&self, update: &StatusUpdate) {
        // No subscribers is fine.
        let _ = self.tx.send(update.clone());
    }
}

pub(crate) struct StatusTracker {
    snapshot: Mutex<StatusSnapshot>,
    reporter: Arc<dyn StatusReporter>,
}

impl StatusTracker {
    pub(crate) fn new(reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            snapshot: Mutex::new(StatusSnapshot::default()),
            reporter,
        }
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn update(&self, update: StatusUpdate) {
        if update.is_empty() {
            return;
        }
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(&update);
        self.reporter.report(&update);
    }
}
