//! Change planner - compares declared resources with recorded state

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What needs to happen to one resource address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Change {
    /// Declared but not recorded
    Create,
    /// Declared and recorded with the same attributes
    Refresh,
    /// Recorded with different identifying attributes: delete then create
    Replace,
    /// Recorded but no longer declared
    Delete,
}

impl Change {
    /// Symbol used when displaying plans
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Refresh => "~",
            Self::Replace => "-/+",
            Self::Delete => "-",
        }
    }

    /// Execution phase, lowest first.
    ///
    /// Deletes finish before replacements start, and both before anything
    /// that may claim an identity they free.
    pub fn phase(&self) -> u8 {
        match self {
            Self::Delete => 0,
            Self::Replace => 1,
            Self::Create | Self::Refresh => 2,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Refresh => "refresh",
            Self::Replace => "replace",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// A change planned for one resource address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    /// Resource address, `kind.name`
    pub address: String,
    /// Planned change
    pub change: Change,
}

/// Plan changes that bring `recorded` in line with `declared`.
///
/// Both maps are keyed by resource address. Deletes come first, then the
/// rest, each group sorted by address.
pub fn plan<E: PartialEq>(
    declared: &BTreeMap<String, E>,
    recorded: &BTreeMap<String, E>,
) -> Vec<PlannedChange> {
    let deletes = recorded
        .keys()
        .filter(|address| !declared.contains_key(*address))
        .map(|address| PlannedChange {
            address: address.clone(),
            change: Change::Delete,
        });

    let others = declared.iter().map(|(address, entry)| {
        let change = match recorded.get(address) {
            None => Change::Create,
            Some(previous) if previous == entry => Change::Refresh,
            Some(_) => Change::Replace,
        };
        PlannedChange {
            address: address.clone(),
            change,
        }
    });

    deletes.chain(others).collect()
}

/// Plan summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub creates: usize,
    pub refreshes: usize,
    pub replaces: usize,
    pub deletes: usize,
}

impl PlanSummary {
    /// Create a summary from a list of planned changes
    pub fn from_changes(changes: &[PlannedChange]) -> Self {
        let mut summary = Self::default();
        for planned in changes {
            match planned.change {
                Change::Create => summary.creates += 1,
                Change::Refresh => summary.refreshes += 1,
                Change::Replace => summary.replaces += 1,
                Change::Delete => summary.deletes += 1,
            }
        }
        summary
    }

    /// Number of remote mutations
    pub fn mutations(&self) -> usize {
        self.creates + self.replaces + self.deletes
    }

    /// Check if there are any mutations
    pub fn has_changes(&self) -> bool {
        self.mutations() > 0
    }
}

/// Filter planned changes to those matching a target pattern
///
/// Target format: "kind" or "kind.name"
pub fn filter_by_target(changes: Vec<PlannedChange>, target: Option<&str>) -> Vec<PlannedChange> {
    match target {
        None => changes,
        Some(t) => {
            let (kind, name) = parse_target(t);
            changes
                .into_iter()
                .filter(|c| matches_filter(&c.address, kind.as_deref(), name.as_deref()))
                .collect()
        }
    }
}

/// Parse a target string like "kind.name" into (kind, name)
pub fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if an address matches the filter criteria
fn matches_filter(address: &str, kind: Option<&str>, name: Option<&str>) -> bool {
    let (address_kind, address_name) = address.split_once('.').unwrap_or((address, ""));

    if let Some(k) = kind {
        // Allow plural aliases
        let matches_kind = match k {
            "projects" => address_kind == "project",
            "ssh_keys" | "keys" => address_kind == "ssh_key",
            _ => address_kind == k,
        };
        if !matches_kind {
            return false;
        }
    }

    if let Some(n) = name
        && address_name != n
    {
        return false;
    }

    true
}
