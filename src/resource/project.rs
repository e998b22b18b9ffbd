//! Followed project resource
//!
//! A project is "managed" while the authenticated user follows it. The
//! identity is `<organization>.<project>`.

use circleci::{Project, ProjectApi, Vcs};
use declarative::{
    AttributeDrift, BoxError, Error, Field, IdentityParts, IdentityScheme, ResourceKind, Result,
};
use std::fmt;

/// Identity layout of followed projects
pub static PROJECT_SCHEME: IdentityScheme = IdentityScheme::new(
    "circleci_project",
    &[Field::verbatim("organization"), Field::verbatim("project")],
);

/// A followed project as declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredProject {
    /// Organization; falls back to the provider default when unset
    pub organization: Option<String>,
    /// Repository name
    pub project: String,
}

impl DeclaredProject {
    pub fn new(organization: Option<String>, project: impl Into<String>) -> anyhow::Result<Self> {
        let project = project.into();
        anyhow::ensure!(!project.is_empty(), "project name must not be empty");
        Ok(Self {
            organization: organization.filter(|o| !o.is_empty()),
            project,
        })
    }
}

/// A project with its organization resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProject {
    pub organization: String,
    pub project: String,
}

impl fmt::Display for ResolvedProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization, self.project)
    }
}

/// Attributes reported by CircleCI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectComputed {
    /// Repository name as CircleCI spells it
    pub reponame: String,
}

/// Followed project kind, bound to one VCS
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectKind {
    pub vcs: Vcs,
}

impl ProjectKind {
    pub fn new(vcs: Vcs) -> Self {
        Self { vcs }
    }
}

impl ResourceKind for ProjectKind {
    type Client = dyn ProjectApi;
    type Declared = DeclaredProject;
    type Resolved = ResolvedProject;
    type Observed = Project;
    type Computed = ProjectComputed;
    type Seed = ();

    fn scheme(&self) -> &'static IdentityScheme {
        &PROJECT_SCHEME
    }

    fn label(&self, declared: &DeclaredProject) -> String {
        declared.project.clone()
    }

    fn organization<'d>(&self, declared: &'d DeclaredProject) -> Option<&'d str> {
        declared.organization.as_deref()
    }

    fn resolve(&self, declared: &DeclaredProject, organization: String) -> Result<ResolvedProject> {
        Ok(ResolvedProject {
            organization,
            project: declared.project.clone(),
        })
    }

    fn identity<'r>(&self, resolved: &'r ResolvedProject) -> Vec<&'r str> {
        vec![&resolved.organization, &resolved.project]
    }

    fn fetch_remote(
        &self,
        client: &dyn ProjectApi,
        resolved: &ResolvedProject,
    ) -> std::result::Result<Option<Project>, BoxError> {
        Ok(client.get_project(&resolved.organization, &resolved.project)?)
    }

    fn check_conflict(&self, resolved: &ResolvedProject, _observed: &Project) -> Result<()> {
        Err(Error::AlreadyManagedExternally {
            kind: self.name(),
            target: format!("{resolved} on {}", self.vcs),
        })
    }

    fn create_remote(
        &self,
        client: &dyn ProjectApi,
        resolved: &ResolvedProject,
    ) -> std::result::Result<(), BoxError> {
        let followed = client.follow(self.vcs, &resolved.organization, &resolved.project)?;
        if !followed.following {
            log::warn!("CircleCI did not confirm following {resolved}");
        }
        Ok(())
    }

    fn recorded(
        &self,
        parts: IdentityParts,
        _computed: &ProjectComputed,
    ) -> Result<ResolvedProject> {
        let mut values = parts.into_values().into_iter();
        Ok(ResolvedProject {
            organization: values.next().unwrap_or_default(),
            project: values.next().unwrap_or_default(),
        })
    }

    fn delete_remote(
        &self,
        client: &dyn ProjectApi,
        resolved: &ResolvedProject,
    ) -> std::result::Result<(), BoxError> {
        if !client.unfollow(self.vcs, &resolved.organization, &resolved.project)? {
            log::warn!("Project {resolved} was not followed");
        }
        Ok(())
    }

    fn match_observed(
        &self,
        _resolved: &ResolvedProject,
        observed: &Project,
    ) -> Option<ProjectComputed> {
        Some(ProjectComputed {
            reponame: observed.reponame.clone(),
        })
    }

    fn computed(&self, resolved: &ResolvedProject) -> ProjectComputed {
        ProjectComputed {
            reponame: resolved.project.clone(),
        }
    }

    fn refresh(
        &self,
        declared: &mut DeclaredProject,
        computed: &ProjectComputed,
    ) -> Vec<AttributeDrift> {
        let drift = AttributeDrift::compare("project", &declared.project, &computed.reponame);
        declared.project.clone_from(&computed.reponame);
        drift.into_iter().collect()
    }

    fn from_identity(&self, parts: IdentityParts, _seed: ()) -> Result<DeclaredProject> {
        let mut values = parts.into_values().into_iter();
        let organization = values.next().filter(|o| !o.is_empty());
        let project = values.next().unwrap_or_default();
        Ok(DeclaredProject {
            organization,
            project,
        })
    }
}
