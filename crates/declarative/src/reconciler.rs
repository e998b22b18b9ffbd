//! Generic reconciler
//!
//! One implementation of create, read, exists, delete and import, shared by
//! every [`ResourceKind`]. A reconciler holds no mutable state, so
//! different resources may be reconciled concurrently.

use crate::context::{ProviderContext, resolve_organization};
use crate::diff::ReadOutcome;
use crate::error::{Error, Result};
use crate::identity::ResourceId;
use crate::resource::{Managed, ResourceKind};

/// Lifecycle operations for one resource kind
#[derive(Debug, Clone, Default)]
pub struct Reconciler<K> {
    kind: K,
}

type ManagedOf<K> = Managed<<K as ResourceKind>::Declared, <K as ResourceKind>::Computed>;
type ReadOf<K> = ReadOutcome<<K as ResourceKind>::Declared, <K as ResourceKind>::Computed>;

impl<K: ResourceKind> Reconciler<K> {
    pub fn new(kind: K) -> Self {
        Self { kind }
    }

    /// The wrapped kind
    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Create the declared resource remotely.
    ///
    /// The identity is encoded before any remote call. A remote object that
    /// is already there is a conflict, never a success.
    pub fn create(
        &self,
        ctx: &ProviderContext<'_, K::Client>,
        declared: K::Declared,
    ) -> Result<ManagedOf<K>> {
        let kind = self.kind.name();
        let resolved = self.resolve(ctx, &declared)?;
        let id = self.kind.scheme().encode(&self.kind.identity(&resolved))?;
        log::debug!("Creating {kind} {resolved}");

        let observed = self
            .kind
            .fetch_remote(ctx.client(), &resolved)
            .map_err(|e| Error::transport(kind, &resolved, e))?;
        if let Some(observed) = &observed {
            self.kind.check_conflict(&resolved, observed)?;
        }

        self.kind
            .create_remote(ctx.client(), &resolved)
            .map_err(|e| Error::transport(kind, &resolved, e))?;

        log::info!("Created {kind} {id}");
        Ok(Managed {
            id,
            computed: self.kind.computed(&resolved),
            declared,
        })
    }

    /// Read the resource back, correcting declared attributes from the remote.
    ///
    /// Fails with [`Error::ResourceGone`] when nothing remote matches.
    pub fn read(
        &self,
        ctx: &ProviderContext<'_, K::Client>,
        declared: K::Declared,
    ) -> Result<ReadOf<K>> {
        let kind = self.kind.name();
        let resolved = self.resolve(ctx, &declared)?;
        let id = self.kind.scheme().encode(&self.kind.identity(&resolved))?;

        let computed = self
            .lookup(ctx, &resolved)?
            .ok_or_else(|| Error::gone(kind, &resolved))?;

        let mut declared = declared;
        let drift = self.kind.refresh(&mut declared, &computed);
        for d in &drift {
            log::info!("{kind} {id}: {d}");
        }

        Ok(ReadOutcome {
            resource: Managed {
                id,
                declared,
                computed,
            },
            drift,
        })
    }

    /// Check whether the resource exists remotely.
    ///
    /// Absence is `Ok(false)`, not an error.
    pub fn exists(
        &self,
        ctx: &ProviderContext<'_, K::Client>,
        declared: &K::Declared,
    ) -> Result<bool> {
        let resolved = self.resolve(ctx, declared)?;
        Ok(self.lookup(ctx, &resolved)?.is_some())
    }

    /// Delete the resource remotely and return the bare declaration.
    ///
    /// The target is the recorded identity, not the declaration, so a
    /// changed default organization or key still deletes what was created.
    /// No existence check is made; deleting something absent succeeds.
    pub fn delete(
        &self,
        ctx: &ProviderContext<'_, K::Client>,
        managed: ManagedOf<K>,
    ) -> Result<K::Declared> {
        let kind = self.kind.name();
        let parts = self.kind.scheme().decode(managed.id.as_str())?;
        let target = self.kind.recorded(parts, &managed.computed)?;
        log::debug!("Deleting {kind} {}", managed.id);

        self.kind
            .delete_remote(ctx.client(), &target)
            .map_err(|e| Error::transport(kind, &target, e))?;

        log::info!("Deleted {kind} {}", managed.id);
        Ok(managed.into_declared())
    }

    /// Rebuild a declaration from an identifier.
    ///
    /// The field count is the only thing validated before the kind takes over.
    pub fn decode(&self, id: &str, seed: K::Seed) -> Result<K::Declared> {
        let parts = self.kind.scheme().decode(id)?;
        self.kind.from_identity(parts, seed)
    }

    /// Import an existing remote resource by identifier.
    pub fn import(
        &self,
        ctx: &ProviderContext<'_, K::Client>,
        id: &str,
        seed: K::Seed,
    ) -> Result<ReadOf<K>> {
        log::debug!("Importing {} {id}", self.kind.name());
        let declared = self.decode(id, seed)?;
        self.read(ctx, declared)
    }

    /// Re-derive the identifier of a declaration without remote calls.
    pub fn identify(
        &self,
        ctx: &ProviderContext<'_, K::Client>,
        declared: &K::Declared,
    ) -> Result<ResourceId> {
        self.identify_under(ctx.default_organization(), declared)
    }

    /// Re-derive the identifier under a default organization, without a
    /// remote accessor.
    pub fn identify_under(
        &self,
        default_organization: Option<&str>,
        declared: &K::Declared,
    ) -> Result<ResourceId> {
        let resolved = self.resolve_under(default_organization, declared)?;
        self.kind.scheme().encode(&self.kind.identity(&resolved))
    }

    fn resolve(
        &self,
        ctx: &ProviderContext<'_, K::Client>,
        declared: &K::Declared,
    ) -> Result<K::Resolved> {
        self.resolve_under(ctx.default_organization(), declared)
    }

    fn resolve_under(
        &self,
        default_organization: Option<&str>,
        declared: &K::Declared,
    ) -> Result<K::Resolved> {
        let organization = resolve_organization(
            self.kind.name(),
            &self.kind.label(declared),
            self.kind.organization(declared),
            default_organization,
        )?;
        self.kind.resolve(declared, organization)
    }

    fn lookup(
        &self,
        ctx: &ProviderContext<'_, K::Client>,
        resolved: &K::Resolved,
    ) -> Result<Option<K::Computed>> {
        let observed = self
            .kind
            .fetch_remote(ctx.client(), resolved)
            .map_err(|e| Error::transport(self.kind.name(), resolved, e))?;
        Ok(observed.and_then(|o| self.kind.match_observed(resolved, &o)))
    }
}
