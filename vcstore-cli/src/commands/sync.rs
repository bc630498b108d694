use anyhow::Result;
use colored::Colorize;
use dialoguer::{Input, Password};
use std::path::Path;
use vcstore_core::{Credential, ObjectStore, SyncOutcome};

/// Clones on first use, then synchronizes. Prompts once for a credential
/// when the remote asks for one.
pub async fn run(config: &Path, ask_credential: bool) -> Result<()> {
    let store = super::open_store(config)?;

    if ask_credential {
        prompt_credential(&store)?;
    }

    let spinner = crate::display::spinner("Synchronizing with remote...");
    let mut outcome = store.init(false).await;
    spinner.finish_and_clear();

    if matches!(outcome, Ok(SyncOutcome::NeedsCredential)) && !ask_credential {
        println!("{}", "The remote requires a credential".yellow());
        prompt_credential(&store)?;
        let spinner = crate::display::spinner("Retrying...");
        outcome = store.synchronize().await;
        spinner.finish_and_clear();
    }

    report(&store, outcome?)
}

/// Publishes local commits now instead of on the next cycle.
pub async fn push(config: &Path) -> Result<()> {
    let store = super::open_store(config)?;
    super::require_initialized(&store)?;

    store.request_deferred_push();
    let spinner = crate::display::spinner("Pushing...");
    let outcome = store.init(false).await;
    spinner.finish_and_clear();

    report(&store, outcome?)
}

fn prompt_credential(store: &ObjectStore) -> Result<()> {
    let remote = store.remote_config();
    let identity: String = Input::new()
        .with_prompt("Username")
        .with_initial_text(remote.identity)
        .allow_empty(true)
        .interact_text()?;
    let secret = Password::new()
        .with_prompt(format!("Secret for {}", remote.url))
        .interact()?;

    store.set_credential(Some(Credential::new(identity).with_secret(secret)));
    Ok(())
}

fn report(store: &ObjectStore, outcome: SyncOutcome) -> Result<()> {
    let line = crate::display::outcome(outcome);
    if outcome.is_success() {
        println!("{} {}", "✓".green().bold(), line);
    } else {
        println!("{} {}", "✗".red().bold(), line);
    }
    println!();
    crate::display::print_status(&store.status());

    if outcome == SyncOutcome::LocalChanges {
        println!();
        println!(
            "Commit with {} or throw changes away with {}",
            "vcstore commit".cyan(),
            "vcstore discard --execute".cyan()
        );
    }
    Ok(())
}
