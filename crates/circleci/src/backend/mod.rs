//! Backend traits and implementations for the CircleCI API.
//!
//! This module provides the [`ProjectApi`] and [`SshKeyApi`] capability
//! traits. The primary implementation is [`http::HttpBackend`], talking to
//! the v1.1 REST API.
//!
//! Lookups return an absent value rather than an error when nothing exists
//! remotely. Mutations are synchronous: their effect is visible to the next
//! lookup.
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use circleci::backend::{MockBackend, ProjectApi};
//! use circleci::Vcs;
//!
//! let mock = MockBackend::new();
//! assert!(mock.get_project("acme", "widgets").unwrap().is_none());
//!
//! mock.follow(Vcs::GitHub, "acme", "widgets").unwrap();
//! assert!(mock.get_project("acme", "widgets").unwrap().is_some());
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{FollowedProject, Project, ProjectSettings, SshKey, Vcs};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Followed-project capabilities.
pub trait ProjectApi: Send + Sync {
    /// Look up a followed project; `None` when it is not followed.
    fn get_project(&self, organization: &str, project: &str) -> Result<Option<Project>>;

    /// Start following a project.
    fn follow(&self, vcs: Vcs, organization: &str, project: &str) -> Result<FollowedProject>;

    /// Stop following a project.
    ///
    /// Returns `false` when the project was already absent.
    fn unfollow(&self, vcs: Vcs, organization: &str, project: &str) -> Result<bool>;
}

/// Project SSH key capabilities.
pub trait SshKeyApi: Send + Sync {
    /// Fetch project settings with the complete SSH key list.
    fn get_settings(&self, vcs: Vcs, organization: &str, project: &str)
    -> Result<ProjectSettings>;

    /// Attach a private key to a project.
    fn add_ssh_key(
        &self,
        vcs: Vcs,
        organization: &str,
        project: &str,
        hostname: &str,
        private_key: &str,
    ) -> Result<()>;

    /// Remove a key; removing an absent key succeeds.
    fn delete_ssh_key(
        &self,
        vcs: Vcs,
        organization: &str,
        project: &str,
        hostname: &str,
        fingerprint: &str,
    ) -> Result<()>;
}

/// Computes the fingerprint the service would report for a private key.
pub type Fingerprinter = dyn Fn(&str) -> std::result::Result<String, String> + Send + Sync;

type ProjectKey = (String, String);

fn project_key(organization: &str, project: &str) -> ProjectKey {
    (organization.to_lowercase(), project.to_lowercase())
}

#[derive(Default)]
struct MockState {
    projects: BTreeMap<ProjectKey, Project>,
    ssh_keys: BTreeMap<ProjectKey, Vec<SshKey>>,
    calls: usize,
    fail_next: Option<Error>,
}

/// Mock backend for testing without network access.
///
/// Stores projects and keys in memory behind shared interior state, so
/// clones observe each other's changes. Project lookups ignore case like
/// the real API.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    fingerprinter: Option<Arc<Fingerprinter>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `fingerprinter` to derive fingerprints of added keys.
    ///
    /// Without one, adding a key fails.
    #[must_use]
    pub fn with_fingerprinter<F>(mut self, fingerprinter: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        self.fingerprinter = Some(Arc::new(fingerprinter));
        self
    }

    /// Add a followed project as if it had been followed out of band.
    pub fn seed_project(&self, vcs: Vcs, organization: &str, project: &str) {
        self.lock().projects.insert(
            project_key(organization, project),
            Project {
                username: organization.to_string(),
                reponame: project.to_string(),
                vcs_url: format!("https://{}/{}/{}", vcs.host(), organization, project),
            },
        );
    }

    /// Attach a key as if it had been added out of band.
    pub fn seed_ssh_key(
        &self,
        organization: &str,
        project: &str,
        hostname: &str,
        fingerprint: &str,
    ) {
        self.lock()
            .ssh_keys
            .entry(project_key(organization, project))
            .or_default()
            .push(SshKey {
                hostname: hostname.to_string(),
                fingerprint: fingerprint.to_string(),
                public_key: String::new(),
            });
    }

    /// Make the next call fail with `error`.
    pub fn fail_next(&self, error: Error) {
        self.lock().fail_next = Some(error);
    }

    /// Number of API calls made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Keys currently attached to a project.
    #[must_use]
    pub fn ssh_keys(&self, organization: &str, project: &str) -> Vec<SshKey> {
        self.lock()
            .ssh_keys
            .get(&project_key(organization, project))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of followed projects.
    #[must_use]
    pub fn project_count(&self) -> usize {
        self.lock().projects.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a call, returning the scripted failure if one is pending.
    fn begin(&self) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls += 1;
        let pending = state.fail_next.take();
        match pending {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

impl ProjectApi for MockBackend {
    fn get_project(&self, organization: &str, project: &str) -> Result<Option<Project>> {
        let state = self.begin()?;
        Ok(state
            .projects
            .get(&project_key(organization, project))
            .cloned())
    }

    fn follow(&self, vcs: Vcs, organization: &str, project: &str) -> Result<FollowedProject> {
        let mut state = self.begin()?;
        state
            .projects
            .entry(project_key(organization, project))
            .or_insert_with(|| Project {
                username: organization.to_string(),
                reponame: project.to_string(),
                vcs_url: format!("https://{}/{}/{}", vcs.host(), organization, project),
            });
        Ok(FollowedProject { following: true })
    }

    fn unfollow(&self, _vcs: Vcs, organization: &str, project: &str) -> Result<bool> {
        let mut state = self.begin()?;
        Ok(state
            .projects
            .remove(&project_key(organization, project))
            .is_some())
    }
}

impl SshKeyApi for MockBackend {
    fn get_settings(
        &self,
        _vcs: Vcs,
        organization: &str,
        project: &str,
    ) -> Result<ProjectSettings> {
        let state = self.begin()?;
        Ok(ProjectSettings {
            ssh_keys: state
                .ssh_keys
                .get(&project_key(organization, project))
                .cloned()
                .unwrap_or_default(),
        })
    }

    fn add_ssh_key(
        &self,
        _vcs: Vcs,
        organization: &str,
        project: &str,
        hostname: &str,
        private_key: &str,
    ) -> Result<()> {
        let mut state = self.begin()?;
        let fingerprinter: &Fingerprinter = self
            .fingerprinter
            .as_deref()
            .ok_or_else(|| Error::Other("mock backend has no fingerprinter".to_string()))?;
        let fingerprint = fingerprinter(private_key).map_err(|e| Error::http(e, Some(400)))?;

        state
            .ssh_keys
            .entry(project_key(organization, project))
            .or_default()
            .push(SshKey {
                hostname: hostname.to_string(),
                fingerprint,
                public_key: String::new(),
            });
        Ok(())
    }

    fn delete_ssh_key(
        &self,
        _vcs: Vcs,
        organization: &str,
        project: &str,
        hostname: &str,
        fingerprint: &str,
    ) -> Result<()> {
        let mut state = self.begin()?;
        if let Some(keys) = state.ssh_keys.get_mut(&project_key(organization, project)) {
            keys.retain(|k| !(k.hostname == hostname && k.fingerprint == fingerprint));
        }
        Ok(())
    }
}
