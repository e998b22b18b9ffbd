//! # Declarative
//!
//! A framework for reconciling declared resources against a remote service.
//!
//! This crate provides the core abstractions for giving a resource a stable
//! identity, creating, reading and deleting it idempotently, and importing
//! it back from nothing but its identifier.
//!
//! ## Core Concepts
//!
//! - **IdentityScheme**: How a resource's composite key is encoded and decoded
//! - **ResourceKind**: The per-kind capability set (fetch, create, delete, match)
//! - **Reconciler**: Create/Read/Exists/Delete/Import, written once for all kinds
//! - **ProviderContext**: Immutable provider settings and the remote accessor
//! - **Planner / Executor**: Turn declared vs. recorded sets into operations
//!   and run them in parallel
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ProviderContext, Reconciler};
//!
//! let ctx = ProviderContext::new(&backend as &dyn ProjectApi)
//!     .with_default_organization("acme");
//! let projects = Reconciler::new(ProjectKind::new(Vcs::GitHub));
//!
//! let managed = projects.create(&ctx, DeclaredProject::new(None, "widgets")?)?;
//! assert_eq!(managed.id.as_str(), "acme.widgets");
//!
//! let imported = projects.import(&ctx, "acme.widgets", ())?;
//! projects.delete(&ctx, imported.resource)?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`ResourceKind`]: Remote capabilities of one resource kind
//! - [`Operation`]: One unit of work for the executor
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! a specific HTTP client, UI framework or prompt library.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod identity;
pub mod planner;
pub mod reconciler;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback, ProviderContext,
};
pub use diff::{AttributeDrift, ReadOutcome};
pub use error::{BoxError, Error, ErrorCategory, Result};
pub use executor::{
    BoxedOperation, Execution, Operation, OperationReport, Outcome, execute, execute_simple,
};
pub use identity::{Field, IdentityParts, IdentityScheme, Normalize, ResourceId};
pub use planner::{Change, PlanSummary, PlannedChange, filter_by_target, plan};
pub use reconciler::Reconciler;
pub use resource::{Managed, ResourceKind};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary};
