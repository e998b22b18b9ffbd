//! Per-kind capability set for reconciliation
//!
//! A resource kind describes how to compute an identity, how to talk to the
//! remote service and how to match what comes back. The control flow that
//! strings these together lives once in [`Reconciler`](crate::Reconciler).

use crate::diff::AttributeDrift;
use crate::error::{BoxError, Result};
use crate::identity::{IdentityParts, IdentityScheme, ResourceId};
use std::fmt;

/// Capability set of one resource kind.
///
/// # Example
///
/// ```ignore
/// impl ResourceKind for ProjectKind {
///     type Client = dyn ProjectApi;
///     type Declared = DeclaredProject;
///     type Resolved = ResolvedProject;
///     type Observed = Project;
///     type Computed = ProjectComputed;
///     type Seed = ();
///
///     fn scheme(&self) -> &'static IdentityScheme {
///         &PROJECT_SCHEME
///     }
///     // ...
/// }
/// ```
pub trait ResourceKind {
    /// Remote accessor this kind talks to
    type Client: ?Sized;
    /// Attributes supplied by the caller
    type Declared: Clone + fmt::Debug;
    /// Declared attributes with organization and derived values resolved
    ///
    /// `Display` names the remote object in error messages.
    type Resolved: fmt::Display;
    /// What a remote lookup returns when something is there
    type Observed;
    /// Attributes recorded after create or read
    type Computed: Clone + fmt::Debug + PartialEq;
    /// Extra input an import needs beyond the identifier
    type Seed;

    /// Identity layout of this kind
    fn scheme(&self) -> &'static IdentityScheme;

    /// Kind name used in errors and logs
    fn name(&self) -> &'static str {
        self.scheme().kind()
    }

    /// Short human-readable name of a declaration
    fn label(&self, declared: &Self::Declared) -> String;

    /// Organization set on the declaration itself
    fn organization<'d>(&self, declared: &'d Self::Declared) -> Option<&'d str>;

    /// Resolve the declaration against the effective organization.
    ///
    /// May derive attributes such as a key fingerprint.
    fn resolve(&self, declared: &Self::Declared, organization: String) -> Result<Self::Resolved>;

    /// Identity components in scheme field order
    fn identity<'r>(&self, resolved: &'r Self::Resolved) -> Vec<&'r str>;

    /// Look the resource up remotely; `None` means absent
    fn fetch_remote(
        &self,
        client: &Self::Client,
        resolved: &Self::Resolved,
    ) -> std::result::Result<Option<Self::Observed>, BoxError>;

    /// Fail when an observation collides with a resource about to be created
    fn check_conflict(&self, resolved: &Self::Resolved, observed: &Self::Observed) -> Result<()>;

    /// Create the resource remotely
    fn create_remote(
        &self,
        client: &Self::Client,
        resolved: &Self::Resolved,
    ) -> std::result::Result<(), BoxError>;

    /// Rebuild the remote target of a managed resource from its recorded
    /// identifier and computed attributes, without the declaration
    fn recorded(&self, parts: IdentityParts, computed: &Self::Computed) -> Result<Self::Resolved>;

    /// Delete the resource remotely; absence counts as success
    fn delete_remote(
        &self,
        client: &Self::Client,
        resolved: &Self::Resolved,
    ) -> std::result::Result<(), BoxError>;

    /// Find this resource in an observation
    fn match_observed(
        &self,
        resolved: &Self::Resolved,
        observed: &Self::Observed,
    ) -> Option<Self::Computed>;

    /// Computed attributes right after a successful create
    fn computed(&self, resolved: &Self::Resolved) -> Self::Computed;

    /// Overwrite declared attributes with observed ones, reporting drift
    fn refresh(&self, declared: &mut Self::Declared, computed: &Self::Computed)
    -> Vec<AttributeDrift>;

    /// Rebuild a declaration from decoded identity components
    fn from_identity(&self, parts: IdentityParts, seed: Self::Seed) -> Result<Self::Declared>;
}

/// A resource under management: declaration, identity and computed state
#[derive(Debug, Clone, PartialEq)]
pub struct Managed<D, C> {
    /// Identifier persisted for the lifetime of the resource
    pub id: ResourceId,
    /// Attributes as declared (refreshed on read)
    pub declared: D,
    /// Attributes computed by the remote side
    pub computed: C,
}

impl<D, C> Managed<D, C> {
    /// Drop the identity, leaving the bare declaration
    pub fn into_declared(self) -> D {
        self.declared
    }
}
