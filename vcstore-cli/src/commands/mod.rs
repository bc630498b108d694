pub mod commit;
pub mod diff;
pub mod discard;
pub mod log;
pub mod serve;
pub mod show;
pub mod status;
pub mod sync;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use vcstore_core::{
    FileSettings, ObjectStore, RemoteSettings, ScopedAdapter, SettingsSource, StoreOptions,
    TracingReporter,
};

/// Builds the store described by a settings file. A relative working
/// directory is taken relative to the file.
pub fn open_store(config: &Path) -> Result<Arc<ObjectStore>> {
    let settings = FileSettings::load(config)
        .with_context(|| format!("Failed to load settings from {}", config.display()))?;

    let mut options = StoreOptions::resolve(&settings)?;
    if options.working_directory.is_relative() {
        let base = config.parent().unwrap_or_else(|| Path::new("."));
        options.working_directory = base.join(&options.working_directory);
    }
    let remote = RemoteSettings::resolve(&settings)?;

    let scopes = scopes(&settings)?;
    debug!(workdir = ?options.working_directory, ?scopes, "opening store");

    let store = ObjectStore::with_json_store(options, remote, Arc::new(TracingReporter));
    for scope in scopes {
        store.register_manager(Arc::new(ScopedAdapter::new(scope)))?;
    }
    Ok(Arc::new(store))
}

fn scopes(settings: &dyn SettingsSource) -> Result<Vec<String>> {
    let scopes = settings
        .get_value("store.scopes")?
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|scope| !scope.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    Ok(scopes)
}

pub fn require_initialized(store: &ObjectStore) -> Result<()> {
    if !store.engine().is_initialized()? {
        anyhow::bail!(
            "No working directory at {}. Run 'vcstore sync' first.",
            store.working_directory().display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_store_resolves_relative_workdir() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("vcstore.toml");
        std::fs::write(
            &config,
            "[store]\nworking_directory = \"data\"\nscopes = [\"notes\"]\n\n[remote]\nurl = \"/srv/db.git\"\n",
        )
        .unwrap();

        let store = open_store(&config).unwrap();

        assert_eq!(store.working_directory(), dir.path().join("data"));
        assert_eq!(store.remote_config().url, "/srv/db.git");
        assert!(require_initialized(&store).is_err());
    }

    #[test]
    fn test_scopes_are_split_and_trimmed() {
        let settings = FileSettings::parse("[store]\nscopes = [\"notes\", \" people \", \"\"]\n").unwrap();
        assert_eq!(scopes(&settings).unwrap(), vec!["notes", "people"]);
    }
}
