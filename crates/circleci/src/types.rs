//! Core types for the CircleCI API.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version control system a project lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vcs {
    /// github.com
    #[default]
    #[serde(alias = "gh")]
    GitHub,
    /// bitbucket.org
    #[serde(alias = "bb")]
    Bitbucket,
}

impl Vcs {
    /// Path segment used in API URLs.
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::Bitbucket => "bitbucket",
        }
    }

    /// Host serving repositories of this VCS.
    #[must_use]
    pub fn host(&self) -> &'static str {
        match self {
            Self::GitHub => "github.com",
            Self::Bitbucket => "bitbucket.org",
        }
    }
}

impl fmt::Display for Vcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for Vcs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" | "gh" => Ok(Self::GitHub),
            "bitbucket" | "bb" => Ok(Self::Bitbucket),
            _ => Err(Error::UnknownVcs(s.to_string())),
        }
    }
}

/// A project followed by the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Organization (or user) owning the repository.
    pub username: String,
    /// Repository name as reported by the API.
    pub reponame: String,
    /// Repository URL.
    #[serde(default)]
    pub vcs_url: String,
}

impl Project {
    /// Whether this record is the given organization/project, ignoring case.
    #[must_use]
    pub fn matches(&self, organization: &str, project: &str) -> bool {
        self.username.eq_ignore_ascii_case(organization)
            && self.reponame.eq_ignore_ascii_case(project)
    }
}

/// Response to a follow request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowedProject {
    /// Whether the project is now followed.
    #[serde(default)]
    pub following: bool,
}

/// Project settings, reduced to the parts this crate uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Every SSH key attached to the project.
    #[serde(default)]
    pub ssh_keys: Vec<SshKey>,
}

impl ProjectSettings {
    /// Find a key by fingerprint, whatever its hostname.
    #[must_use]
    pub fn key_with_fingerprint(&self, fingerprint: &str) -> Option<&SshKey> {
        self.ssh_keys.iter().find(|k| k.fingerprint == fingerprint)
    }

    /// Find a key by fingerprint and hostname.
    #[must_use]
    pub fn key(&self, fingerprint: &str, hostname: &str) -> Option<&SshKey> {
        self.ssh_keys
            .iter()
            .find(|k| k.fingerprint == fingerprint && k.hostname == hostname)
    }
}

/// An SSH key attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    /// Host the key is used for (empty means any host).
    #[serde(default)]
    pub hostname: String,
    /// Legacy MD5 fingerprint, colon-separated.
    pub fingerprint: String,
    /// Public half of the key.
    #[serde(default)]
    pub public_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcs_from_str() {
        assert_eq!("github".parse::<Vcs>().unwrap(), Vcs::GitHub);
        assert_eq!("GH".parse::<Vcs>().unwrap(), Vcs::GitHub);
        assert_eq!("Bitbucket".parse::<Vcs>().unwrap(), Vcs::Bitbucket);
        assert_eq!("bb".parse::<Vcs>().unwrap(), Vcs::Bitbucket);
        assert!(matches!(
            "gitlab".parse::<Vcs>(),
            Err(Error::UnknownVcs(s)) if s == "gitlab"
        ));
    }

    #[test]
    fn test_vcs_display() {
        assert_eq!(Vcs::GitHub.to_string(), "github");
        assert_eq!(Vcs::Bitbucket.to_string(), "bitbucket");
        assert_eq!(Vcs::Bitbucket.host(), "bitbucket.org");
        assert_eq!(Vcs::default(), Vcs::GitHub);
    }

    #[test]
    fn test_project_matches_ignores_case() {
        let project = Project {
            username: "Acme".to_string(),
            reponame: "Widgets".to_string(),
            vcs_url: String::new(),
        };
        assert!(project.matches("acme", "widgets"));
        assert!(!project.matches("acme", "gadgets"));
    }

    #[test]
    fn test_settings_deserialize() {
        let json = r#"{
            "ssh_keys": [
                {"hostname": "github.com", "fingerprint": "aa:bb", "public_key": "ssh-rsa AAAA"},
                {"fingerprint": "cc:dd"}
            ],
            "feature_flags": {"oss": true}
        }"#;
        let settings: ProjectSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.ssh_keys.len(), 2);
        assert_eq!(settings.ssh_keys[1].hostname, "");

        assert!(settings.key("aa:bb", "github.com").is_some());
        assert!(settings.key("aa:bb", "gitlab.com").is_none());
        assert!(settings.key_with_fingerprint("cc:dd").is_some());
    }

    #[test]
    fn test_settings_missing_keys() {
        let settings: ProjectSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.ssh_keys.is_empty());
    }
}
