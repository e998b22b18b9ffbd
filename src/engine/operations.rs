//! Planned changes as executable operations

use super::Provider;
use crate::manifest::Entry;
use crate::state::Record;
use declarative::{BoxedOperation, Change, Error, Operation, PlannedChange, Result};
use std::collections::BTreeMap;

/// Reconciles one resource address.
///
/// Succeeds with the record to keep, or `None` when the resource is gone
/// from state: deleted, or found removed outside ciform on refresh.
pub struct EntryOperation<'p> {
    provider: &'p Provider<'p>,
    address: String,
    change: Change,
    desired: Option<Entry>,
    recorded: Option<Record>,
}

impl<'p> EntryOperation<'p> {
    pub fn new(
        provider: &'p Provider<'p>,
        planned: &PlannedChange,
        desired: Option<Entry>,
        recorded: Option<Record>,
    ) -> Self {
        Self {
            provider,
            address: planned.address.clone(),
            change: planned.change,
            desired,
            recorded,
        }
    }

    fn desired(&self) -> Result<&Entry> {
        self.desired.as_ref().ok_or_else(|| {
            Error::malformed("resource", &self.address, "not declared in the manifest")
        })
    }

    fn recorded(&self) -> Result<&Record> {
        self.recorded.as_ref().ok_or_else(|| {
            Error::malformed("resource", &self.address, "not recorded in state")
        })
    }
}

impl Operation for EntryOperation<'_> {
    type Output = Option<Record>;

    fn address(&self) -> &str {
        &self.address
    }

    fn change(&self) -> Change {
        self.change
    }

    fn run(&self) -> Result<Option<Record>> {
        match self.change {
            Change::Create => self
                .provider
                .create(&self.address, self.desired()?)
                .map(Some),
            Change::Refresh => {
                self.provider.refresh(&self.address, self.desired()?, self.recorded()?)
            }
            Change::Replace => {
                // Identifying attributes cannot change in place
                self.provider.delete(&self.address, self.recorded()?)?;
                self.provider.create(&self.address, self.desired()?).map(Some)
            }
            Change::Delete => {
                self.provider.delete(&self.address, self.recorded()?)?;
                Ok(None)
            }
        }
    }
}

/// Turn planned changes into operations against `provider`
pub fn build_operations<'p>(
    provider: &'p Provider<'p>,
    changes: &[PlannedChange],
    desired: &BTreeMap<String, Entry>,
    recorded: &BTreeMap<String, Record>,
) -> Vec<BoxedOperation<'p, Option<Record>>> {
    changes
        .iter()
        .map(|planned| {
            let op = EntryOperation::new(
                provider,
                planned,
                desired.get(&planned.address).cloned(),
                recorded.get(&planned.address).cloned(),
            );
            Box::new(op) as BoxedOperation<'p, Option<Record>>
        })
        .collect()
}
