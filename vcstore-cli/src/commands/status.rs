use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use vcstore_core::{CommitSummary, ObjectStore};

/// What a fresh process can know without talking to the remote.
pub(crate) async fn local_state(store: &ObjectStore) -> Result<(bool, Option<CommitSummary>)> {
    let has_local_changes = store.check_uncommitted().await?;
    let last_commit = store.history(1).await?.into_iter().next();
    Ok((has_local_changes, last_commit))
}

pub async fn run(config: &Path) -> Result<()> {
    let store = super::open_store(config)?;

    if !store.engine().is_initialized()? {
        println!("{}", "No working directory yet".red());
        println!("Run {} to clone the remote", "vcstore sync".cyan());
        return Ok(());
    }

    let (has_local_changes, last_commit) = local_state(&store).await?;
    let uncommitted = store.list_uncommitted().await?;

    println!("{}", "Store Status".bold().cyan());
    println!("  {}: {}", "Root".bold(), store.working_directory().display());
    println!("  {}: {}", "Remote URL".bold(), store.remote_config().url);
    crate::display::print_local_status(has_local_changes, last_commit.as_ref());
    println!(
        "  {}: run {} to compare with the remote",
        "Remote".bold(),
        "vcstore sync".cyan()
    );
    println!();

    if uncommitted.is_empty() {
        println!("{}", "No uncommitted changes".green());
        return Ok(());
    }

    println!(
        "{} {}",
        "Uncommitted objects:".bold(),
        format!("({})", uncommitted.len()).yellow()
    );
    println!();

    for reference in uncommitted.iter().take(10) {
        let icon = if store.read(reference, &[]).ok().flatten().is_some() {
            "~".yellow()
        } else {
            "-".red()
        };
        println!("  {} {}", icon, reference);
    }

    if uncommitted.len() > 10 {
        println!();
        println!(
            "  {} and {} more...",
            "...".dimmed(),
            (uncommitted.len() - 10).to_string().yellow()
        );
    }

    println!();
    println!(
        "Run {} to commit these changes",
        "vcstore commit \"message\"".cyan()
    );

    Ok(())
}
