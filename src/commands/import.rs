use super::Workspace;
use crate::Context;
use crate::engine::Provider;
use crate::ui;
use anyhow::{Context as _, Result, bail};

pub fn run(ctx: &Context, address: &str, identifier: &str) -> Result<()> {
    let ws = Workspace::load(ctx)?;
    let mut state = ws.load_state()?;

    let Some(entry) = ws.manifest.entry(address) else {
        bail!(
            "{address} is not declared in {}; add it before importing",
            ctx.manifest.display()
        );
    };
    if let Some(existing) = state.get(address) {
        bail!("{address} is already managed as {}", existing.id());
    }

    let backend = ws.backend(ctx)?;
    let provider = Provider::new(&backend, ws.vcs(ctx), ws.organization(ctx));
    let record = provider
        .import(address, &entry, identifier)
        .with_context(|| format!("Failed to import {address}"))?;

    let id = record.id().clone();
    state.insert(address, record);
    state.touch(&ws.state_path)?;

    ui::success(&format!("Imported {address} as {id}"));
    Ok(())
}
