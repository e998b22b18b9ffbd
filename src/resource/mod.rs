//! CircleCI resource kinds
//!
//! Each kind plugs a CircleCI capability into the generic reconciler:
//! - [`ProjectKind`]: a project followed by the token's user
//! - [`SshKeyKind`]: an SSH key attached to a project

pub mod fingerprint;
pub mod project;
pub mod ssh_key;

pub use project::{DeclaredProject, ProjectComputed, ProjectKind};
pub use ssh_key::{DeclaredSshKey, PrivateKey, SshKeyComputed, SshKeyKind, SshKeySeed};
