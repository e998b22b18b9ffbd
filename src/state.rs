//! Recorded state: what ciform manages and under which identifier
//!
//! The state file keeps, per resource, the manifest entry it was created
//! from, the identifier and the attributes CircleCI reported. Key material
//! is never written here, only the path it was read from.

use crate::manifest::{
    Entry, PROJECT_PREFIX, ProjectEntry, SSH_KEY_PREFIX, SshKeyEntry, address,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_STATE_FILE: &str = "ciform.state.toml";

// ============================================================================
// State Structures
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CiformState {
    /// Followed projects by manifest name
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectRecord>,

    /// SSH keys by manifest name
    #[serde(default)]
    pub ssh_keys: BTreeMap<String, SshKeyRecord>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: ResourceId,
    pub entry: ProjectEntry,
    /// Repository name reported by CircleCI
    pub reponame: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SshKeyRecord {
    pub id: ResourceId,
    pub entry: SshKeyEntry,
    pub hostname: String,
    pub fingerprint: String,
}

/// A record of either kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Project(ProjectRecord),
    SshKey(SshKeyRecord),
}

impl Record {
    pub fn id(&self) -> &ResourceId {
        match self {
            Self::Project(p) => &p.id,
            Self::SshKey(k) => &k.id,
        }
    }

    /// The manifest entry this record was created from
    pub fn entry(&self) -> Entry {
        match self {
            Self::Project(p) => Entry::Project(p.entry.clone()),
            Self::SshKey(k) => Entry::SshKey(k.entry.clone()),
        }
    }
}

impl Default for CiformState {
    fn default() -> Self {
        Self {
            projects: BTreeMap::new(),
            ssh_keys: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// CiformState Implementation
// ============================================================================

impl CiformState {
    /// State file used for a manifest when none is given
    pub fn default_path(manifest: &Path) -> PathBuf {
        manifest
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(DEFAULT_STATE_FILE)
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: CiformState = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(path)
    }

    // ========================================================================
    // Record Helpers
    // ========================================================================

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.ssh_keys.is_empty()
    }

    /// Entries of every recorded resource keyed by address
    pub fn entries(&self) -> BTreeMap<String, Entry> {
        self.records()
            .into_iter()
            .map(|(addr, record)| (addr, record.entry()))
            .collect()
    }

    /// Every record keyed by address
    pub fn records(&self) -> BTreeMap<String, Record> {
        let projects = self.projects.iter().map(|(name, p)| {
            (address(PROJECT_PREFIX, name), Record::Project(p.clone()))
        });
        let keys = self
            .ssh_keys
            .iter()
            .map(|(name, k)| (address(SSH_KEY_PREFIX, name), Record::SshKey(k.clone())));
        projects.chain(keys).collect()
    }

    pub fn get(&self, addr: &str) -> Option<Record> {
        match addr.split_once('.')? {
            (PROJECT_PREFIX, name) => self.projects.get(name).cloned().map(Record::Project),
            (SSH_KEY_PREFIX, name) => self.ssh_keys.get(name).cloned().map(Record::SshKey),
            _ => None,
        }
    }

    /// Record a resource under an address, replacing any previous record
    pub fn insert(&mut self, addr: &str, record: Record) {
        let Some((_, name)) = addr.split_once('.') else {
            log::warn!("Ignoring record with malformed address '{addr}'");
            return;
        };
        match record {
            Record::Project(p) => {
                self.projects.insert(name.to_string(), p);
            }
            Record::SshKey(k) => {
                self.ssh_keys.insert(name.to_string(), k);
            }
        }
    }

    pub fn remove(&mut self, addr: &str) -> Option<Record> {
        match addr.split_once('.')? {
            (PROJECT_PREFIX, name) => self.projects.remove(name).map(Record::Project),
            (SSH_KEY_PREFIX, name) => self.ssh_keys.remove(name).map(Record::SshKey),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
