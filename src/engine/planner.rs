//! Execution planner - ciform-specific extensions
//!
//! The generic planner compares manifest entries with the entries recorded
//! in state. Entries that compare equal may still resolve to a different
//! identity, e.g. after the default organization changed or a key file was
//! rotated in place. Those are replaced, never refreshed.

use super::identify;
use crate::manifest::Entry;
use crate::state::Record;
use declarative::{Change, PlannedChange, plan};
use std::collections::BTreeMap;

/// Plan the changes that bring `recorded` in line with `desired`
pub fn plan_changes(
    desired: &BTreeMap<String, Entry>,
    recorded: &BTreeMap<String, Record>,
    organization: Option<&str>,
) -> Vec<PlannedChange> {
    let recorded_entries: BTreeMap<String, Entry> = recorded
        .iter()
        .map(|(address, record)| (address.clone(), record.entry()))
        .collect();

    plan(desired, &recorded_entries)
        .into_iter()
        .map(|mut planned| {
            if planned.change == Change::Refresh
                && let (Some(entry), Some(record)) =
                    (desired.get(&planned.address), recorded.get(&planned.address))
                && identity_moved(&planned.address, entry, record, organization)
            {
                planned.change = Change::Replace;
            }
            planned
        })
        .collect()
}

fn identity_moved(
    address: &str,
    entry: &Entry,
    record: &Record,
    organization: Option<&str>,
) -> bool {
    match identify(address, entry, organization) {
        Ok(id) if &id != record.id() => {
            log::info!("{address} moved from {} to {id}", record.id());
            true
        }
        Ok(_) => false,
        // The refresh reports it
        Err(e) => {
            log::debug!("Cannot identify {address}: {e}");
            false
        }
    }
}
