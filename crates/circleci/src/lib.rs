//! # circleci
//!
//! Blocking client for the parts of the CircleCI v1.1 API that manage
//! followed projects and project SSH keys.
//!
//! This crate provides:
//! - Capability traits ([`ProjectApi`], [`SshKeyApi`]) that callers depend on
//! - An HTTP implementation ([`HttpBackend`]) using the `Circle-Token` header
//! - An in-memory implementation ([`MockBackend`]) for tests
//!
//! ## Example
//!
//! ```no_run
//! use circleci::{HttpBackend, ProjectApi, SshKeyApi, Vcs};
//!
//! let backend = HttpBackend::new(std::env::var("CIRCLECI_TOKEN").unwrap());
//!
//! if backend.get_project("acme", "widgets").unwrap().is_none() {
//!     backend.follow(Vcs::GitHub, "acme", "widgets").unwrap();
//! }
//!
//! let settings = backend.get_settings(Vcs::GitHub, "acme", "widgets").unwrap();
//! for key in &settings.ssh_keys {
//!     println!("{} {}", key.hostname, key.fingerprint);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::http::HttpBackend;
pub use backend::{MockBackend, ProjectApi, SshKeyApi};
pub use error::{Error, ErrorCategory, Result};
pub use types::{FollowedProject, Project, ProjectSettings, SshKey, Vcs};
