use anyhow::Result;
use colored::Colorize;
use std::path::Path;

/// Diffs one object against `rev`, or every uncommitted object against HEAD.
pub async fn run(config: &Path, id: Option<String>, rev: String) -> Result<()> {
    let store = super::open_store(config)?;
    super::require_initialized(&store)?;

    let ids = match id {
        Some(id) => vec![id],
        None => {
            let uncommitted = store.list_uncommitted().await?;
            if uncommitted.is_empty() {
                println!("{}", "No uncommitted changes".green());
                return Ok(());
            }
            println!("{}", "Uncommitted changes".bold().cyan());
            println!();
            uncommitted
        }
    };

    for id in ids {
        match store.diff(&id, &rev).await {
            Ok(diff) if diff.is_unchanged() => {
                println!("{} {}", id.white().bold(), "unchanged".dimmed());
            }
            Ok(diff) => crate::display::print_diff(&diff),
            Err(e) => {
                println!("{} {}", id.white().bold(), format!("[{}]", e).dimmed());
            }
        }
    }

    Ok(())
}
