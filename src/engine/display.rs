//! Plan and result display - ciform-specific UI

use crate::manifest::{Entry, PROJECT_PREFIX, SSH_KEY_PREFIX};
use colored::{ColoredString, Colorize};
use declarative::{
    ApplyResult, Change, ConfirmCallback, ExecuteSummary, PlanSummary, PlannedChange,
    ProgressCallback,
};
use std::collections::BTreeMap;

fn symbol(change: Change) -> ColoredString {
    match change {
        Change::Create => change.symbol().green(),
        Change::Refresh => change.symbol().dimmed(),
        Change::Replace => change.symbol().yellow(),
        Change::Delete => change.symbol().red(),
    }
}

fn group_title(address: &str) -> &str {
    match address.split_once('.').map(|(kind, _)| kind) {
        Some(PROJECT_PREFIX) => "Followed projects",
        Some(SSH_KEY_PREFIX) => "SSH keys",
        Some(other) => other,
        None => address,
    }
}

/// Display planned changes grouped by resource kind
pub fn display_plan(changes: &[PlannedChange], entries: &BTreeMap<String, Entry>) {
    let summary = PlanSummary::from_changes(changes);
    if !summary.has_changes() {
        println!();
        println!("  {} No changes needed", "✓".green());
        if summary.refreshes > 0 {
            println!(
                "  {}",
                format!("{} resources will be refreshed", summary.refreshes).dimmed()
            );
        }
        return;
    }

    let mut by_kind: BTreeMap<&str, Vec<&PlannedChange>> = BTreeMap::new();
    for planned in changes {
        by_kind
            .entry(group_title(&planned.address))
            .or_default()
            .push(planned);
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for (title, kind_changes) in &by_kind {
        println!("│ {}", title.bold());
        for planned in kind_changes {
            let target = entries
                .get(&planned.address)
                .map(Entry::target)
                .unwrap_or_default();
            println!(
                "│   {:<3} {:<30} {}",
                symbol(planned.change),
                planned.address,
                target.dimmed()
            );
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to replace, {} to delete, {} to refresh",
        summary.creates.to_string().green(),
        summary.replaces.to_string().yellow(),
        summary.deletes.to_string().red(),
        summary.refreshes
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Prints one line per finished operation
#[derive(Default)]
pub struct ApplyProgress {
    done: usize,
    total: usize,
}

impl ProgressCallback for ApplyProgress {
    fn on_start(&mut self, count: usize) {
        self.total = count;
        println!();
        println!("  {} Applying {} resources...", "→".cyan(), count);
    }

    fn on_operation_complete(&mut self, address: &str, result: &ApplyResult) {
        self.done += 1;
        let counter = format!("[{}/{}]", self.done, self.total).dimmed();
        match result {
            ApplyResult::Created => println!("    {} {counter} {address} created", "✓".green()),
            ApplyResult::Refreshed => {
                println!("    {} {counter} {address} refreshed", "○".dimmed());
            }
            ApplyResult::Replaced => println!("    {} {counter} {address} replaced", "✓".green()),
            ApplyResult::Deleted => println!("    {} {counter} {address} deleted", "✓".green()),
            ApplyResult::Skipped { reason } => {
                println!("    {} {counter} {address} skipped: {reason}", "⊘".yellow());
            }
            ApplyResult::Failed { error } => {
                println!("    {} {counter} {address}", "✗".red());
                println!("        {}", error.red());
            }
        }
    }

    fn on_finish(&mut self) {}
}

/// Asks through dialoguer unless `yes` was given
pub struct DialoguerConfirm {
    pub yes: bool,
}

impl ConfirmCallback for DialoguerConfirm {
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool> {
        if self.yes {
            return Ok(true);
        }

        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;

        if !confirmed {
            println!();
            println!("  {} Aborted", "✗".red());
        }
        Ok(confirmed)
    }
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.refreshed > 0 {
        println!("    • {} resources refreshed", summary.refreshed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}
