use anyhow::Result;
use colored::Colorize;
use std::path::Path;

/// Prints an object, optionally as it was at a given revision.
pub async fn run(config: &Path, id: String, rev: Option<String>) -> Result<()> {
    let store = super::open_store(config)?;
    super::require_initialized(&store)?;

    let found = match &rev {
        Some(rev) => store.read_version(&id, rev).await?,
        None => store.read(&id, &[])?,
    };

    match found {
        Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        None => {
            let at = rev.map(|r| format!(" at {}", r)).unwrap_or_default();
            anyhow::bail!("{}{}", format!("No object {}", id).red(), at);
        }
    }

    Ok(())
}
