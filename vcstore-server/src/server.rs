use crate::api::{create_router, AppState};
use crate::watcher::ChangeWatcher;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use vcstore_core::{Credential, ObjectStore, SecretStore};

pub struct StoreServer {
    store: Arc<ObjectStore>,
    secrets: Arc<dyn SecretStore>,
    sync_interval: Option<Duration>,
    watch: bool,
}

impl StoreServer {
    pub fn new(store: Arc<ObjectStore>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            secrets,
            sync_interval: None,
            watch: true,
        }
    }

    /// Synchronize on a fixed period in addition to explicit requests.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    pub fn without_watcher(mut self) -> Self {
        self.watch = false;
        self
    }

    pub fn state(&self) -> AppState {
        AppState {
            store: Arc::clone(&self.store),
            secrets: Arc::clone(&self.secrets),
        }
    }

    /// Loads a persisted secret for the configured remote into the store.
    pub fn restore_credential(&self) -> anyhow::Result<bool> {
        let remote = self.store.remote_config();
        let Some(secret) = self.secrets.get_secret(&remote.url)? else {
            return Ok(false);
        };
        self.store
            .set_credential(Some(Credential::new(remote.identity).with_secret(secret)));
        Ok(true)
    }

    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let _watcher = if self.watch {
            Some(ChangeWatcher::new(Arc::clone(&self.store))?)
        } else {
            None
        };
        let timer = self
            .sync_interval
            .map(|interval| spawn_sync_timer(Arc::clone(&self.store), interval));

        let app = create_router(self.state())
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

        info!("Server listening on {}", addr);
        info!("Working directory: {:?}", self.store.working_directory());

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let served = axum::serve(listener, app).await;

        if let Some(timer) = timer {
            timer.abort();
        }
        served?;
        Ok(())
    }
}

/// Periodic synchronization. The first tick is skipped: callers run `init()`,
/// which already synchronizes once.
pub fn spawn_sync_timer(store: Arc<ObjectStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.synchronize().await {
                Ok(outcome) => debug!(?outcome, "periodic synchronization"),
                Err(e) => warn!("Periodic synchronization failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vcstore_core::{MemorySecretStore, RemoteSettings, StoreOptions, TracingReporter};

    fn store(dir: &TempDir) -> Arc<ObjectStore> {
        let settings = RemoteSettings {
            remote_url: "https://example.invalid/db.git".to_string(),
            identity: "alice".to_string(),
            ..RemoteSettings::default()
        };
        Arc::new(ObjectStore::with_json_store(
            StoreOptions::new(dir.path()),
            settings,
            Arc::new(TracingReporter),
        ))
    }

    #[tokio::test]
    async fn test_restore_credential() {
        let dir = TempDir::new().unwrap();
        let secrets = Arc::new(MemorySecretStore::new());
        let server = StoreServer::new(store(&dir), secrets.clone());

        assert!(!server.restore_credential().unwrap());

        secrets
            .set_secret("https://example.invalid/db.git", Some("token"))
            .unwrap();
        assert!(server.restore_credential().unwrap());

        let credential = server.state().store.credential().unwrap();
        assert_eq!(credential.identity, "alice");
        assert_eq!(credential.secret.as_deref(), Some("token"));
    }

    #[tokio::test]
    async fn test_sync_timer_can_be_stopped() {
        let dir = TempDir::new().unwrap();
        let timer = spawn_sync_timer(store(&dir), Duration::from_secs(3600));

        timer.abort();
        assert!(timer.await.unwrap_err().is_cancelled());
    }
}
