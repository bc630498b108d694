use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use std::path::Path;

pub async fn run(config: &Path, ids: Vec<String>, execute: bool, yes: bool) -> Result<()> {
    let store = super::open_store(config)?;
    super::require_initialized(&store)?;

    let uncommitted = store.list_uncommitted().await?;
    let targets: Vec<&String> = uncommitted
        .iter()
        .filter(|reference| ids.is_empty() || ids.iter().any(|id| id == *reference))
        .collect();

    if targets.is_empty() {
        println!("{}", "Nothing to discard".yellow());
        return Ok(());
    }

    println!("{}", "Discard Preview".bold().cyan());
    for reference in &targets {
        let committed = store.read_version(reference, "HEAD").await.ok().flatten();
        let current = store.read(reference, &[]).ok().flatten();
        let state = match (committed, current) {
            (None, _) => "will be removed".red(),
            (Some(_), None) => "will be recreated".green(),
            (Some(_), Some(_)) => "will be restored".yellow(),
        };
        println!("  {} {}", reference, state);
    }
    println!();

    if !execute {
        println!("{}", "This is a preview only.".yellow());
        println!(
            "Run with {} to actually discard the changes",
            "--execute".cyan()
        );
        return Ok(());
    }

    if !yes
        && !Confirm::new()
            .with_prompt("Discard these changes? This cannot be undone")
            .default(false)
            .interact()?
    {
        println!("{}", "Aborted".dimmed());
        return Ok(());
    }

    println!("{}", "Discarding...".bold());
    let discarded = if ids.is_empty() {
        store.discard_all().await?
    } else {
        store.discard(&ids).await?
    };

    for path in &discarded {
        println!("  {} {}", "✓".green(), path);
    }
    println!();
    println!(
        "{}",
        format!("✓ Discarded {} file(s)", discarded.len())
            .green()
            .bold()
    );

    Ok(())
}
