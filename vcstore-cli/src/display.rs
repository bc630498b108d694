use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use vcstore_core::{CommitSummary, ObjectDiff, RelativeToRemote, StatusSnapshot, SyncOutcome};

pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

pub fn outcome(outcome: SyncOutcome) -> ColoredString {
    match outcome {
        SyncOutcome::Updated => "up to date".green(),
        SyncOutcome::Ahead => "ahead of remote (run 'vcstore push')".yellow(),
        SyncOutcome::AlreadyRunning => "another synchronization is running".dimmed(),
        SyncOutcome::LocalChanges => "blocked by uncommitted changes".yellow(),
        SyncOutcome::Offline => "remote unreachable".red(),
        SyncOutcome::NeedsCredential => "credential required".red(),
        SyncOutcome::Misconfigured => "remote URL or author missing".red(),
        SyncOutcome::Diverged => "local and remote history diverged".red().bold(),
        SyncOutcome::Failed => "failed (see log)".red(),
    }
}

fn relative(relative: RelativeToRemote) -> ColoredString {
    match relative {
        RelativeToRemote::None => "unknown".dimmed(),
        RelativeToRemote::Updated => "up to date".green(),
        RelativeToRemote::Ahead => "ahead".yellow(),
        RelativeToRemote::Behind => "behind".yellow(),
        RelativeToRemote::Diverged => "diverged".red().bold(),
    }
}

fn flag(on: bool) -> ColoredString {
    if on {
        "yes".yellow()
    } else {
        "no".dimmed()
    }
}

/// Local state only; remote fields are known after a synchronization.
pub fn print_local_status(has_local_changes: bool, last_commit: Option<&CommitSummary>) {
    println!("  {}: {}", "Local changes".bold(), flag(has_local_changes));
    match last_commit {
        Some(commit) => println!(
            "  {}: {} {} ({})",
            "Last commit".bold(),
            commit.id.chars().take(8).collect::<String>().yellow(),
            commit.summary,
            commit.timestamp.format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("  {}: {}", "Last commit".bold(), "none".dimmed()),
    }
}

pub fn print_status(status: &StatusSnapshot) {
    println!("  {}: {}", "Remote".bold(), relative(status.relative_to_remote));
    println!(
        "  {}: {}",
        "Online".bold(),
        if status.is_online { "yes".green() } else { "no".red() }
    );
    println!("  {}: {}", "Local changes".bold(), flag(status.has_local_changes));
    println!("  {}: {}", "Needs credential".bold(), flag(status.needs_credential));
    println!("  {}: {}", "Misconfigured".bold(), flag(status.is_misconfigured));
    if let Some(at) = status.last_synchronized {
        println!(
            "  {}: {}",
            "Last synchronized".bold(),
            at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

pub fn print_diff(diff: &ObjectDiff) {
    println!("{}", "━".repeat(80).bright_black());
    let status = match (&diff.old_content, &diff.new_content) {
        (None, Some(_)) => "NEW".green(),
        (Some(_), None) => "DEL".red(),
        _ => "MOD".yellow(),
    };
    println!(
        "{} {} {}",
        status,
        diff.reference.white().bold(),
        format!("(+{} -{})", diff.additions(), diff.deletions()).dimmed()
    );
    println!();

    for line in diff.format_unified(3).lines() {
        println!("{}", diff_line(line));
    }
    println!();
}

fn diff_line(line: &str) -> ColoredString {
    if line.starts_with("---") || line.starts_with("+++") {
        line.bold()
    } else if line.starts_with("@@") {
        line.cyan()
    } else if line.starts_with('+') {
        line.green()
    } else if line.starts_with('-') {
        line.red()
    } else {
        line.normal()
    }
}
