use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub async fn run(config: &Path, limit: Option<usize>) -> Result<()> {
    let store = super::open_store(config)?;
    super::require_initialized(&store)?;

    let limit = limit.unwrap_or(20);
    // One extra tells whether there is more to show.
    let commits = store.history(limit + 1).await?;

    if commits.is_empty() {
        println!("{}", "No commits yet".yellow());
        return Ok(());
    }

    println!("{}", "Commit History".bold().cyan());
    println!();

    for commit in commits.iter().take(limit) {
        println!("{} {}", "commit".yellow().bold(), commit.id.yellow());
        println!(
            "{}: {} <{}>",
            "Author".bold(),
            commit.author_name,
            commit.author_email
        );
        println!(
            "{}: {}",
            "Date".bold(),
            commit.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        println!();
        println!("    {}", commit.summary);
        println!();
    }

    if commits.len() > limit {
        println!("{}", "... and more commits".dimmed());
        println!("Use {} to see more", "--limit N".cyan());
    }

    Ok(())
}
