//! Drift between declared and observed attributes

use crate::resource::Managed;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One attribute whose declared value differs from the remote one.
///
/// Observed values always win; the drift is reported, then corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDrift {
    /// Attribute name
    pub attribute: &'static str,
    /// Value in the declaration before the read
    pub declared: String,
    /// Value reported by the remote service
    pub observed: String,
}

impl AttributeDrift {
    /// Compare two values, returning a drift entry when they differ
    pub fn compare(attribute: &'static str, declared: &str, observed: &str) -> Option<Self> {
        if declared == observed {
            return None;
        }
        Some(Self {
            attribute,
            declared: declared.to_string(),
            observed: observed.to_string(),
        })
    }
}

impl fmt::Display for AttributeDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: \"{}\" -> \"{}\"",
            self.attribute, self.declared, self.observed
        )
    }
}

/// Result of reading a managed resource back from the remote service
#[derive(Debug, Clone)]
pub struct ReadOutcome<D, C> {
    /// The resource with its declaration refreshed from the remote
    pub resource: Managed<D, C>,
    /// Attributes that were corrected
    pub drift: Vec<AttributeDrift>,
}

impl<D, C> ReadOutcome<D, C> {
    /// Check if any attribute drifted
    pub fn has_drift(&self) -> bool {
        !self.drift.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_equal() {
        assert!(AttributeDrift::compare("project", "widgets", "widgets").is_none());
    }

    #[test]
    fn test_compare_differs() {
        let drift = AttributeDrift::compare("project", "widgets", "Widgets").unwrap();
        assert_eq!(drift.attribute, "project");
        assert_eq!(drift.to_string(), "project: \"widgets\" -> \"Widgets\"");
    }
}
