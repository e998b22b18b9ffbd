//! CircleCI v1.1 REST backend.
//!
//! This module provides the [`HttpBackend`] implementation, a blocking
//! client over `ureq`. Every request carries the API token in the
//! `Circle-Token` header.

use crate::backend::{ProjectApi, SshKeyApi};
use crate::error::{Error, Result};
use crate::types::{FollowedProject, Project, ProjectSettings, Vcs};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://circleci.com/api/v1.1";

/// Default global request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const USER_AGENT: &str = concat!("ciform/", env!("CARGO_PKG_VERSION"));

/// Blocking CircleCI API backend.
///
/// # Example
///
/// ```no_run
/// use circleci::backend::http::HttpBackend;
/// use circleci::backend::ProjectApi;
///
/// let backend = HttpBackend::new("my-token");
/// let project = backend.get_project("acme", "widgets").unwrap();
/// println!("followed: {}", project.is_some());
/// ```
pub struct HttpBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// API base URL, without a trailing slash.
    api_base: String,
    /// API token.
    token: String,
}

impl HttpBackend {
    /// Create a backend for the public CircleCI API.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(DEFAULT_API_BASE, token)
    }

    /// Create a backend with a custom API base (self-hosted or testing).
    #[must_use]
    pub fn with_api_base(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            agent: build_agent(DEFAULT_TIMEOUT),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Replace the global request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// URL listing every followed project.
    fn projects_url(&self) -> String {
        format!("{}/projects", self.api_base)
    }

    /// URL of a project endpoint.
    fn project_url(&self, vcs: Vcs, organization: &str, project: &str, endpoint: &str) -> String {
        format!(
            "{}/project/{}/{}/{}/{}",
            self.api_base, vcs, organization, project, endpoint
        )
    }

    fn get(&self, url: &str) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
        log::debug!("GET {url}");
        self.agent
            .get(url)
            .header("Circle-Token", self.token.as_str())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
    }

    fn post(&self, url: &str) -> ureq::RequestBuilder<ureq::typestate::WithBody> {
        log::debug!("POST {url}");
        self.agent
            .post(url)
            .header("Circle-Token", self.token.as_str())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
    }

    fn delete(&self, url: &str) -> ureq::RequestBuilder<ureq::typestate::WithBody> {
        log::debug!("DELETE {url}");
        self.agent
            .delete(url)
            .header("Circle-Token", self.token.as_str())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .force_send_body()
    }
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Treat a 404 as "already absent".
fn absent_ok<T>(result: Result<T>, what: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            log::warn!("{what} was already absent");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl ProjectApi for HttpBackend {
    fn get_project(&self, organization: &str, project: &str) -> Result<Option<Project>> {
        let projects: Vec<Project> = self
            .get(&self.projects_url())
            .call()?
            .body_mut()
            .read_json()?;

        Ok(projects
            .into_iter()
            .find(|p| p.matches(organization, project)))
    }

    fn follow(&self, vcs: Vcs, organization: &str, project: &str) -> Result<FollowedProject> {
        let url = self.project_url(vcs, organization, project, "follow");
        let followed: FollowedProject = self.post(&url).send_empty()?.body_mut().read_json()?;
        Ok(followed)
    }

    fn unfollow(&self, vcs: Vcs, organization: &str, project: &str) -> Result<bool> {
        let url = self.project_url(vcs, organization, project, "unfollow");
        let result = self
            .post(&url)
            .send_empty()
            .map(|_| ())
            .map_err(Error::from);
        Ok(absent_ok(result, &format!("project {organization}/{project}"))?.is_some())
    }
}

#[derive(Serialize)]
struct AddKeyRequest<'a> {
    hostname: &'a str,
    private_key: &'a str,
}

#[derive(Serialize)]
struct DeleteKeyRequest<'a> {
    hostname: &'a str,
    fingerprint: &'a str,
}

impl SshKeyApi for HttpBackend {
    fn get_settings(
        &self,
        vcs: Vcs,
        organization: &str,
        project: &str,
    ) -> Result<ProjectSettings> {
        let url = self.project_url(vcs, organization, project, "settings");
        let settings: ProjectSettings = self.get(&url).call()?.body_mut().read_json()?;
        Ok(settings)
    }

    fn add_ssh_key(
        &self,
        vcs: Vcs,
        organization: &str,
        project: &str,
        hostname: &str,
        private_key: &str,
    ) -> Result<()> {
        let url = self.project_url(vcs, organization, project, "ssh-key");
        self.post(&url).send_json(&AddKeyRequest {
            hostname,
            private_key,
        })?;
        Ok(())
    }

    fn delete_ssh_key(
        &self,
        vcs: Vcs,
        organization: &str,
        project: &str,
        hostname: &str,
        fingerprint: &str,
    ) -> Result<()> {
        let url = self.project_url(vcs, organization, project, "ssh-key");
        let result = self
            .delete(&url)
            .send_json(&DeleteKeyRequest {
                hostname,
                fingerprint,
            })
            .map(|_| ())
            .map_err(Error::from);
        absent_ok(
            result,
            &format!("SSH key {fingerprint} on {organization}/{project}"),
        )?;
        Ok(())
    }
}
