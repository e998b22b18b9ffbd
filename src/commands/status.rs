use super::Workspace;
use crate::Context;
use crate::engine::{Provider, Status};
use crate::ui;
use anyhow::{Result, bail};
use colored::Colorize;

pub fn run(ctx: &Context) -> Result<()> {
    let ws = Workspace::load(ctx)?;
    let state = ws.load_state()?;
    let declared = ws.manifest.entries();

    ui::header("ciform status");
    if state.is_empty() && declared.is_empty() {
        ui::info("Nothing declared and nothing recorded");
        return Ok(());
    }

    let backend = ws.backend(ctx)?;
    let provider = Provider::new(&backend, ws.vcs(ctx), ws.organization(ctx));
    ui::kv("VCS", &provider.vcs().to_string());

    let mut failed = 0;
    let mut gone = 0;
    let mut moved = 0;
    for (address, record) in state.records() {
        match provider.status(&address, &record) {
            Ok(Status::Present { drift }) if drift.is_empty() => {
                println!(
                    "  {} {:<30} {}",
                    "✓".green(),
                    address,
                    record.id().to_string().dimmed()
                );
            }
            Ok(Status::Present { drift }) => {
                println!(
                    "  {} {:<30} {}",
                    "~".yellow(),
                    address,
                    record.id().to_string().dimmed()
                );
                for d in drift {
                    println!("      {}", d.to_string().yellow());
                }
            }
            Ok(Status::Gone) => {
                gone += 1;
                println!(
                    "  {} {:<30} {}",
                    "✗".red(),
                    address,
                    "removed outside ciform".red()
                );
            }
            Ok(Status::Moved { identity }) => {
                moved += 1;
                println!(
                    "  {} {:<30} {}",
                    "-/+".yellow(),
                    address,
                    format!("{} now resolves to {identity}", record.id()).yellow()
                );
            }
            Err(e) => {
                failed += 1;
                println!("  {} {:<30} {}", "?".red(), address, e.to_string().red());
                ui::dim(e.category().advice());
            }
        }
    }

    for address in declared.keys().filter(|a| state.get(a).is_none()) {
        println!("  {} {:<30} {}", "+".green(), address, "not created yet".dimmed());
    }

    if gone > 0 {
        println!();
        ui::warn(&format!("{gone} resource(s) will be created again by `ciform apply`"));
    }
    if moved > 0 {
        println!();
        ui::warn(&format!("{moved} resource(s) will be replaced by `ciform apply`"));
    }
    if failed > 0 {
        bail!("{failed} resource(s) could not be checked");
    }
    Ok(())
}
