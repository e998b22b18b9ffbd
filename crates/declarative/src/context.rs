//! Provider context and callback traits
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific remote client, terminal UI or prompt library.

use crate::error::{Error, Result};
use crate::types::ApplyResult;

/// Immutable provider-level configuration passed into every operation.
///
/// Holds the default organization and a borrowed remote accessor. Nothing
/// in it is mutated by reconciliation, so one context can be shared by
/// operations running on different threads.
pub struct ProviderContext<'a, C: ?Sized> {
    default_organization: Option<String>,
    client: &'a C,
}

impl<'a, C: ?Sized> ProviderContext<'a, C> {
    /// Create a context without a default organization
    pub fn new(client: &'a C) -> Self {
        Self {
            default_organization: None,
            client,
        }
    }

    /// Set the provider-level default organization
    pub fn with_default_organization(mut self, organization: impl Into<String>) -> Self {
        self.default_organization = Some(organization.into());
        self
    }

    /// The remote accessor
    pub fn client(&self) -> &'a C {
        self.client
    }

    /// The provider-level default organization, if any
    pub fn default_organization(&self) -> Option<&str> {
        self.default_organization.as_deref()
    }

    /// Resolve the effective organization for a resource.
    ///
    /// A non-empty explicit value wins, then a non-empty provider default.
    /// Fails with [`Error::MissingOrganization`] when both are empty.
    pub fn resolve_organization(
        &self,
        kind: &'static str,
        resource: &str,
        explicit: Option<&str>,
    ) -> Result<String> {
        resolve_organization(kind, resource, explicit, self.default_organization())
    }
}

/// Organization resolution without a context: a non-empty `explicit` value
/// wins, then a non-empty `default`.
pub fn resolve_organization(
    kind: &'static str,
    resource: &str,
    explicit: Option<&str>,
    default: Option<&str>,
) -> Result<String> {
    explicit
        .filter(|org| !org.is_empty())
        .or_else(|| default.filter(|org| !org.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| Error::MissingOrganization {
            kind,
            resource: resource.to_string(),
        })
}

impl<C: ?Sized> Clone for ProviderContext<'_, C> {
    fn clone(&self) -> Self {
        Self {
            default_organization: self.default_organization.clone(),
            client: self.client,
        }
    }
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called before any operation runs
    fn on_start(&mut self, count: usize);

    /// Called when an operation completes
    fn on_operation_complete(&mut self, address: &str, result: &ApplyResult);

    /// Called after every operation has completed
    fn on_finish(&mut self);
}

/// Confirmation callback for user interaction
///
/// Implement this trait to handle user confirmations.
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&mut self, _count: usize) {}
    fn on_operation_complete(&mut self, _address: &str, _result: &ApplyResult) {}
    fn on_finish(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoClient;

    #[test]
    fn test_explicit_organization_wins() {
        let ctx = ProviderContext::new(&NoClient).with_default_organization("default-org");
        let org = ctx
            .resolve_organization("circleci_project", "widgets", Some("acme"))
            .unwrap();
        assert_eq!(org, "acme");
    }

    #[test]
    fn test_empty_explicit_falls_back_to_default() {
        let ctx = ProviderContext::new(&NoClient).with_default_organization("default-org");
        for explicit in [None, Some("")] {
            let org = ctx
                .resolve_organization("circleci_project", "widgets", explicit)
                .unwrap();
            assert_eq!(org, "default-org");
        }
    }

    #[test]
    fn test_missing_organization() {
        let ctx = ProviderContext::new(&NoClient);
        let err = ctx
            .resolve_organization("circleci_project", "widgets", None)
            .unwrap_err();
        assert!(matches!(err, Error::MissingOrganization { .. }));

        let ctx = ProviderContext::new(&NoClient).with_default_organization("");
        let err = ctx
            .resolve_organization("circleci_project", "widgets", Some(""))
            .unwrap_err();
        assert!(err.to_string().contains("widgets"));
    }

    #[test]
    fn test_callbacks() {
        assert!(AutoConfirm.confirm("Apply?").unwrap());
        assert!(!AutoDecline.confirm("Apply?").unwrap());

        let mut progress = NoProgress;
        progress.on_start(1);
        progress.on_operation_complete("project.widgets", &ApplyResult::Created);
        progress.on_finish();
    }
}
