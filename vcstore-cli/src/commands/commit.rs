use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub async fn run(config: &Path, message: String, ids: Vec<String>, removing: bool) -> Result<()> {
    let store = super::open_store(config)?;
    super::require_initialized(&store)?;

    let uncommitted = store.list_uncommitted().await?;
    if uncommitted.is_empty() {
        println!("{}", "No changes to commit".yellow());
        return Ok(());
    }

    println!("{}", "Creating commit...".bold());

    let committed = if ids.is_empty() {
        store.commit_all(&message, removing).await?
    } else {
        store.commit(&ids, &message, removing).await?
    };

    if committed == 0 {
        println!("{}", "None of the given objects have changes".yellow());
        return Ok(());
    }

    let head = store.history(1).await?;
    println!("{}", "✓ Commit created successfully!".green().bold());
    if let Some(commit) = head.first() {
        println!("  {}: {}", "Commit ID".bold(), commit.id);
    }
    println!("  {}: {}", "Message".bold(), message);
    println!("  {}: {}", "Files changed".bold(), committed);
    println!();
    println!("Run {} to publish it", "vcstore push".cyan());

    Ok(())
}
