use notify::{RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vcstore_core::ObjectStore;

type StoreDebouncer = Debouncer<notify::RecommendedWatcher, FileIdMap>;

/// Watches the working directory and refreshes the store's local-changes flag
/// after edits made behind its back.
///
/// The parent directory is watched too, so the recursive watch is re-armed
/// when a re-clone replaces the working directory.
pub struct ChangeWatcher {
    _debouncer: Arc<Mutex<StoreDebouncer>>,
}

impl ChangeWatcher {
    pub fn new(store: Arc<ObjectStore>) -> anyhow::Result<Self> {
        let root_path = store.working_directory().to_path_buf();
        let parent = root_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent)?;
        let (tx, mut rx) = mpsc::channel(100);

        let mut debouncer = new_debouncer(
            Duration::from_millis(500),
            None,
            move |result: DebounceEventResult| {
                if let Err(e) = tx.blocking_send(result) {
                    error!("Failed to send event: {}", e);
                }
            },
        )?;
        debouncer
            .watcher()
            .watch(&parent, RecursiveMode::NonRecursive)?;
        if root_path.is_dir() {
            debouncer
                .watcher()
                .watch(&root_path, RecursiveMode::Recursive)?;
        }
        let debouncer = Arc::new(Mutex::new(debouncer));

        info!("Change watcher started for {:?}", root_path);

        let rearm = Arc::clone(&debouncer);
        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    Ok(events) => {
                        let replaced = events
                            .iter()
                            .any(|event| event.paths.iter().any(|path| path == &root_path));
                        if replaced {
                            Self::rearm(&rearm, &root_path);
                        }

                        let relevant = events.iter().any(|event| {
                            event
                                .paths
                                .iter()
                                .any(|path| !Self::should_ignore(path, &root_path))
                        });
                        if !relevant {
                            continue;
                        }
                        match store.check_uncommitted().await {
                            Ok(changed) => debug!(changed, "refreshed local changes"),
                            Err(e) => debug!("Skipped local changes refresh: {}", e),
                        }
                    }
                    Err(errors) => {
                        for error in errors {
                            error!("Watch error: {:?}", error);
                        }
                    }
                }
            }
        });

        Ok(Self {
            _debouncer: debouncer,
        })
    }

    fn rearm(debouncer: &Mutex<StoreDebouncer>, root_path: &Path) {
        let mut debouncer = debouncer.lock().unwrap_or_else(PoisonError::into_inner);
        let watcher = debouncer.watcher();
        // The old watch may already be gone with the directory.
        let _ = watcher.unwatch(root_path);
        if !root_path.is_dir() {
            return;
        }
        match watcher.watch(root_path, RecursiveMode::Recursive) {
            Ok(()) => info!("Re-armed change watcher for {:?}", root_path),
            Err(e) => warn!("Failed to re-arm change watcher: {}", e),
        }
    }

    /// Git metadata and hidden files (atomic-write staging files included)
    /// never count as object edits.
    fn should_ignore(path: &Path, root_path: &Path) -> bool {
        let Ok(relative_path) = path.strip_prefix(root_path) else {
            return true;
        };
        relative_path
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
    }
}
