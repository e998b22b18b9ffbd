//! Desired state: the `ciform.toml` manifest
//!
//! ```toml
//! [provider]
//! organization = "acme"
//! vcs_type = "github"
//!
//! [projects.widgets]
//! project = "widgets"
//!
//! [ssh_keys.deploy]
//! project = "widgets"
//! hostname = "github.com"
//! private_key_file = "~/.ssh/widgets_deploy"
//! ```

use anyhow::{Context, Result, bail};
use circleci::Vcs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST: &str = "ciform.toml";

/// Address prefix of followed projects
pub const PROJECT_PREFIX: &str = "project";
/// Address prefix of SSH keys
pub const SSH_KEY_PREFIX: &str = "ssh_key";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub projects: BTreeMap<String, ProjectEntry>,

    #[serde(default)]
    pub ssh_keys: BTreeMap<String, SshKeyEntry>,
}

/// Provider-level settings shared by every resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Default organization
    #[serde(default)]
    pub organization: Option<String>,

    #[serde(default)]
    pub vcs_type: Vcs,

    /// API base URL, for self-hosted installations
    #[serde(default)]
    pub url: Option<String>,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Request timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            organization: None,
            vcs_type: Vcs::default(),
            url: None,
            token_env: default_token_env(),
            timeout: None,
        }
    }
}

fn default_token_env() -> String {
    "CIRCLECI_TOKEN".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub project: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub project: String,
    pub hostname: String,
    /// PEM private key; relative paths are resolved against the manifest
    pub private_key_file: PathBuf,
}

/// A manifest entry of either kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Project(ProjectEntry),
    SshKey(SshKeyEntry),
}

impl Entry {
    /// Project the entry belongs to, with its organization if set
    pub fn target(&self) -> String {
        let (organization, project) = match self {
            Self::Project(p) => (p.organization.as_deref(), &p.project),
            Self::SshKey(k) => (k.organization.as_deref(), &k.project),
        };
        match organization {
            Some(org) => format!("{org}/{project}"),
            None => project.clone(),
        }
    }
}

/// Build the address of a resource
pub fn address(prefix: &str, name: &str) -> String {
    format!("{prefix}.{name}")
}

impl Manifest {
    /// Load and validate a manifest, resolving key paths against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        let mut manifest: Manifest = toml::from_str(&content)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for key in manifest.ssh_keys.values_mut() {
            key.private_key_file = resolve_path(base, &key.private_key_file);
        }

        manifest.validate()?;
        log::debug!(
            "Loaded manifest {} ({} projects, {} SSH keys)",
            path.display(),
            manifest.projects.len(),
            manifest.ssh_keys.len()
        );
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, project) in &self.projects {
            check_name(PROJECT_PREFIX, name)?;
            check_organization(PROJECT_PREFIX, name, project.organization.as_deref())?;
            if project.project.is_empty() {
                bail!("{}: project must not be empty", address(PROJECT_PREFIX, name));
            }
        }

        for (name, key) in &self.ssh_keys {
            check_name(SSH_KEY_PREFIX, name)?;
            check_organization(SSH_KEY_PREFIX, name, key.organization.as_deref())?;
            let addr = address(SSH_KEY_PREFIX, name);
            if key.project.is_empty() {
                bail!("{addr}: project must not be empty");
            }
            if key.hostname.is_empty() {
                bail!("{addr}: hostname must not be empty");
            }
            if key.private_key_file.as_os_str().is_empty() {
                bail!("{addr}: private_key_file must not be empty");
            }
        }

        if let Some(org) = &self.provider.organization {
            if org.is_empty() {
                bail!("provider.organization must not be empty when set");
            }
        }

        Ok(())
    }

    /// Every declared resource keyed by address
    pub fn entries(&self) -> BTreeMap<String, Entry> {
        let projects = self
            .projects
            .iter()
            .map(|(name, p)| (address(PROJECT_PREFIX, name), Entry::Project(p.clone())));
        let keys = self
            .ssh_keys
            .iter()
            .map(|(name, k)| (address(SSH_KEY_PREFIX, name), Entry::SshKey(k.clone())));
        projects.chain(keys).collect()
    }

    pub fn entry(&self, address: &str) -> Option<Entry> {
        self.entries().remove(address)
    }
}

fn check_name(prefix: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.contains('.') {
        bail!("Invalid {prefix} name '{name}': names must be non-empty and contain no '.'");
    }
    Ok(())
}

fn check_organization(prefix: &str, name: &str, organization: Option<&str>) -> Result<()> {
    if organization.is_some_and(str::is_empty) {
        bail!(
            "{}: organization must not be empty when set",
            address(prefix, name)
        );
    }
    Ok(())
}

/// Expand `~` and environment variables, then anchor relative paths at `base`
fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw).unwrap_or(std::borrow::Cow::Borrowed(raw.as_ref()));
    let expanded = PathBuf::from(expanded.as_ref());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
