//! Error types for reconciliation.
//!
//! Every error is terminal for the operation that produced it. Nothing in
//! this crate retries or recovers locally; the category tells the caller
//! (usually an orchestrator) what kind of follow-up makes sense.

use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error surfaced verbatim from a remote accessor.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Declaration or provider configuration is incomplete or invalid.
    Config,
    /// A remote object collides with what the declaration wants to create.
    Conflict,
    /// A previously managed remote object no longer exists.
    Gone,
    /// The remote accessor failed (network, auth, server).
    Transport,
}

impl ErrorCategory {
    /// Whether the orchestrator should plan a recreation.
    #[must_use]
    pub fn needs_recreate(&self) -> bool {
        matches!(self, Self::Gone)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Invalid declaration",
            Self::Conflict => "Conflicting remote resource",
            Self::Gone => "Resource deleted out of band",
            Self::Transport => "Remote API failure",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => "Fix the resource declaration or provider settings",
            Self::Conflict => "Import the existing resource or remove it remotely",
            Self::Gone => "Apply again to recreate the resource",
            Self::Transport => "Check connectivity and credentials, then retry",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither the resource nor the provider names an organization.
    #[error("{kind} '{resource}': organization must be set at the resource or provider level")]
    MissingOrganization {
        /// Resource kind.
        kind: &'static str,
        /// Short name of the declared resource.
        resource: String,
    },

    /// An identifier does not match the kind's identity scheme.
    #[error("malformed {kind} identifier '{identifier}': {reason}")]
    MalformedIdentifier {
        /// Resource kind.
        kind: &'static str,
        /// The offending identifier (or the components that would form it).
        identifier: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Declared private key bytes cannot be used.
    #[error("invalid private key for {organization}/{project}: {message}")]
    InvalidKeyMaterial {
        /// Effective organization.
        organization: String,
        /// Project the key belongs to.
        project: String,
        /// Parser message.
        message: String,
    },

    /// Create found a remote object the declaration did not create.
    #[error("{kind} {target} already exists remotely and is not managed by this configuration")]
    AlreadyManagedExternally {
        /// Resource kind.
        kind: &'static str,
        /// Organization, project and scope of the remote object.
        target: String,
    },

    /// Create found a key with the same fingerprint.
    #[error(
        "SSH key with fingerprint '{fingerprint}' already exists for {organization}/{project} (hostname '{hostname}')"
    )]
    DuplicateKey {
        /// Effective organization.
        organization: String,
        /// Project the key is attached to.
        project: String,
        /// Colliding fingerprint.
        fingerprint: String,
        /// Hostname of the existing key.
        hostname: String,
    },

    /// Read found no remote object matching the identity.
    #[error("{kind} {target} not found remotely")]
    ResourceGone {
        /// Resource kind.
        kind: &'static str,
        /// Organization, project and kind-specific attributes.
        target: String,
    },

    /// The accessor failed; the source is kept as-is.
    #[error("{kind} {target}: remote call failed: {source}")]
    Transport {
        /// Resource kind.
        kind: &'static str,
        /// Organization, project and kind-specific attributes.
        target: String,
        /// Accessor error.
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Create a malformed identifier error.
    pub fn malformed(
        kind: &'static str,
        identifier: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedIdentifier {
            kind,
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create a resource gone error.
    pub fn gone(kind: &'static str, target: impl fmt::Display) -> Self {
        Self::ResourceGone {
            kind,
            target: target.to_string(),
        }
    }

    /// Wrap an accessor error.
    pub fn transport(
        kind: &'static str,
        target: impl fmt::Display,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Transport {
            kind,
            target: target.to_string(),
            source: source.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingOrganization { .. }
            | Error::MalformedIdentifier { .. }
            | Error::InvalidKeyMaterial { .. } => ErrorCategory::Config,
            Error::AlreadyManagedExternally { .. } | Error::DuplicateKey { .. } => {
                ErrorCategory::Conflict
            }
            Error::ResourceGone { .. } => ErrorCategory::Gone,
            Error::Transport { .. } => ErrorCategory::Transport,
        }
    }

    /// Whether the remote object disappeared.
    #[must_use]
    pub fn is_gone(&self) -> bool {
        self.category().needs_recreate()
    }
}
