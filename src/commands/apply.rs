//! `plan`, `apply` and `destroy`

use super::Workspace;
use crate::Context;
use crate::engine::display::{ApplyProgress, DialoguerConfirm, display_plan, print_summary};
use crate::engine::{Provider, build_operations, plan_changes};
use crate::manifest::Entry;
use crate::state::CiformState;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use declarative::{
    Change, ExecuteOptions, Execution, Outcome, PlanSummary, PlannedChange, execute,
    filter_by_target,
};
use std::collections::BTreeMap;

pub struct ApplyOptions<'a> {
    pub target: Option<&'a str>,
    pub dry_run: bool,
    pub jobs: usize,
    pub yes: bool,
}

/// Planned changes plus every entry they refer to
struct Planned {
    changes: Vec<PlannedChange>,
    entries: BTreeMap<String, Entry>,
}

fn compute(
    ctx: &Context,
    ws: &Workspace,
    state: &CiformState,
    target: Option<&str>,
) -> Planned {
    let desired = ws.manifest.entries();
    let changes = plan_changes(&desired, &state.records(), ws.organization(ctx));
    let changes = filter_by_target(changes, target);

    let mut entries = state.entries();
    entries.extend(desired);
    Planned { changes, entries }
}

pub fn plan(ctx: &Context, target: Option<&str>) -> Result<()> {
    let ws = Workspace::load(ctx)?;
    let state = ws.load_state()?;
    let planned = compute(ctx, &ws, &state, target);

    if !ctx.quiet {
        ui::header("ciform plan");
        ui::kv("Manifest", &ctx.manifest.display().to_string());
        ui::kv("State", &ws.state_path.display().to_string());
    }
    display_plan(&planned.changes, &planned.entries);
    Ok(())
}

pub fn apply(ctx: &Context, opts: &ApplyOptions<'_>) -> Result<()> {
    let ws = Workspace::load(ctx)?;
    let mut state = ws.load_state()?;
    let planned = compute(ctx, &ws, &state, opts.target);

    display_plan(&planned.changes, &planned.entries);
    if planned.changes.is_empty() {
        return Ok(());
    }

    let backend = ws.backend(ctx)?;
    let provider = Provider::new(&backend, ws.vcs(ctx), ws.organization(ctx));

    let desired = ws.manifest.entries();
    let recorded = state.records();
    let ops = build_operations(&provider, &planned.changes, &desired, &recorded);

    // Refreshes alone do not need confirmation; they never mutate
    let mut confirm = DialoguerConfirm {
        yes: opts.yes || !PlanSummary::from_changes(&planned.changes).has_changes(),
    };
    let execution = execute(
        &ops,
        &ExecuteOptions {
            dry_run: opts.dry_run,
            jobs: opts.jobs.max(1),
        },
        &mut ApplyProgress::default(),
        &mut confirm,
    )?;

    if opts.dry_run {
        println!();
        ui::info("Dry run - no changes made");
        return Ok(());
    }

    finish(&ws, &mut state, execution)
}

pub fn destroy(ctx: &Context, yes: bool) -> Result<()> {
    let ws = Workspace::load(ctx)?;
    let mut state = ws.load_state()?;
    if state.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(());
    }

    let recorded = state.records();
    let changes = plan_changes(&BTreeMap::new(), &recorded, ws.organization(ctx));
    display_plan(&changes, &state.entries());

    let backend = ws.backend(ctx)?;
    let provider = Provider::new(&backend, ws.vcs(ctx), ws.organization(ctx));
    let ops = build_operations(&provider, &changes, &BTreeMap::new(), &recorded);

    let execution = execute(
        &ops,
        &ExecuteOptions {
            dry_run: false,
            jobs: 1,
        },
        &mut ApplyProgress::default(),
        &mut DialoguerConfirm { yes },
    )?;

    finish(&ws, &mut state, execution)
}

/// Record what was applied, save state and report
fn finish(
    ws: &Workspace,
    state: &mut CiformState,
    execution: Execution<Option<crate::state::Record>>,
) -> Result<()> {
    let mut touched = false;
    for report in execution.reports {
        match report.outcome {
            Outcome::Applied(Some(record)) => {
                state.insert(&report.address, record);
                touched = true;
            }
            Outcome::Applied(None) => {
                state.remove(&report.address);
                touched = true;
                if report.change == Change::Refresh {
                    ui::warn(&format!(
                        "{} was removed outside ciform; the next apply creates it again",
                        report.address
                    ));
                }
            }
            Outcome::Failed(e) => {
                let advice = e.category().advice();
                log::debug!("{}: {e} ({advice})", report.address);
            }
            Outcome::Skipped { .. } => {}
        }
    }

    if touched {
        state
            .touch(&ws.state_path)
            .context("Resources were changed but the state file could not be saved")?;
    }

    if execution.summary.total() > execution.summary.skipped {
        print_summary(&execution.summary);
    }

    if !execution.summary.is_success() {
        bail!("{} operation(s) failed", execution.summary.failed);
    }
    Ok(())
}
