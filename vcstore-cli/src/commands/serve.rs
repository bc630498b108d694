use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use vcstore_core::MemorySecretStore;
use vcstore_server::StoreServer;

pub async fn run(config: &Path, port: u16, interval: u64, no_watch: bool) -> Result<()> {
    let store = super::open_store(config)?;

    println!("{}", "🚀 Starting vcstore server...".bold().cyan());
    println!("   {}: {:?}", "Working directory".bold(), store.working_directory());
    println!("   {}: {}", "Remote".bold(), store.remote_config().url);

    let server = StoreServer::new(Arc::clone(&store), Arc::new(MemorySecretStore::new()));
    let server = if interval > 0 {
        server.with_sync_interval(Duration::from_secs(interval))
    } else {
        server
    };
    let server = if no_watch { server.without_watcher() } else { server };

    let outcome = store.init(false).await?;
    println!("   {}: {}", "Initial sync".bold(), crate::display::outcome(outcome));
    println!(
        "   {}: {}",
        "API Server".bold(),
        format!("http://localhost:{}", port).green()
    );
    println!();
    println!("{}", "Press Ctrl+C to stop".dimmed());
    println!();

    let addr = format!("0.0.0.0:{}", port).parse()?;
    server.serve(addr).await?;

    Ok(())
}
