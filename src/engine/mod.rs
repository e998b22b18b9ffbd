//! Execution engine for ciform
//!
//! The engine orchestrates:
//! 1. Planning - Compare manifest entries with recorded state
//! 2. Reconciling - Turn each planned change into reconciler calls
//! 3. Reporting - Display plans, progress and summaries

pub mod display;
pub mod operations;
pub mod planner;

use crate::manifest::{Entry, ProjectEntry, SshKeyEntry};
use crate::resource::project::PROJECT_SCHEME;
use crate::resource::ssh_key::SSH_KEY_SCHEME;
use crate::resource::{
    DeclaredProject, DeclaredSshKey, PrivateKey, ProjectComputed, ProjectKind, SshKeyComputed,
    SshKeyKind, SshKeySeed,
};
use crate::state::{ProjectRecord, Record, SshKeyRecord};
use circleci::{ProjectApi, SshKeyApi, Vcs};
use declarative::{
    AttributeDrift, Error, Managed, ProviderContext, Reconciler, ResourceId, Result,
};

pub use operations::build_operations;
pub use planner::plan_changes;

/// What a status check found
#[derive(Debug)]
pub enum Status {
    /// Present remotely; drift lists corrected attributes
    Present { drift: Vec<AttributeDrift> },
    /// No longer present remotely
    Gone,
    /// The entry now resolves to another identity; apply replaces it
    Moved { identity: ResourceId },
}

/// Both CircleCI resource kinds bound to one backend and provider configuration
pub struct Provider<'a> {
    vcs: Vcs,
    projects: ProviderContext<'a, dyn ProjectApi>,
    ssh_keys: ProviderContext<'a, dyn SshKeyApi>,
    project: Reconciler<ProjectKind>,
    ssh_key: Reconciler<SshKeyKind>,
}

impl<'a> Provider<'a> {
    pub fn new<B>(backend: &'a B, vcs: Vcs, organization: Option<&str>) -> Self
    where
        B: ProjectApi + SshKeyApi + 'static,
    {
        let mut projects = ProviderContext::<dyn ProjectApi>::new(backend);
        let mut ssh_keys = ProviderContext::<dyn SshKeyApi>::new(backend);
        if let Some(org) = organization {
            projects = projects.with_default_organization(org);
            ssh_keys = ssh_keys.with_default_organization(org);
        }

        Self {
            vcs,
            projects,
            ssh_keys,
            project: Reconciler::new(ProjectKind::new(vcs)),
            ssh_key: Reconciler::new(SshKeyKind::new(vcs)),
        }
    }

    pub fn vcs(&self) -> Vcs {
        self.vcs
    }

    /// Provider-level default organization
    pub fn organization(&self) -> Option<&str> {
        self.projects.default_organization()
    }

    /// Create the resource an entry declares
    pub fn create(&self, address: &str, entry: &Entry) -> Result<Record> {
        match entry {
            Entry::Project(p) => {
                let managed = self
                    .project
                    .create(&self.projects, declare_project(address, p)?)?;
                Ok(project_record(managed, p))
            }
            Entry::SshKey(k) => {
                let managed = self
                    .ssh_key
                    .create(&self.ssh_keys, self.declare_ssh_key(address, k)?)?;
                Ok(ssh_key_record(managed, k))
            }
        }
    }

    /// Read a recorded resource back.
    ///
    /// Yields `None` when it has gone, so the next plan creates it again.
    /// Fails without a remote call when the entry no longer resolves to the
    /// recorded identity; that needs a replace, never an in-place refresh.
    pub fn refresh(&self, address: &str, entry: &Entry, record: &Record) -> Result<Option<Record>> {
        let expected = identify(address, entry, self.organization())?;
        if &expected != record.id() {
            return Err(Error::malformed(
                kind_name(entry),
                record.id().as_str(),
                format!("{address} now resolves to '{expected}' and must be replaced"),
            ));
        }

        let read = match entry {
            Entry::Project(p) => self
                .project
                .read(&self.projects, declare_project(address, p)?)
                .map(|outcome| project_record(outcome.resource, p)),
            Entry::SshKey(k) => self
                .ssh_key
                .read(&self.ssh_keys, self.declare_ssh_key(address, k)?)
                .map(|outcome| ssh_key_record(outcome.resource, k)),
        };

        match read {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_gone() => {
                log::warn!("{address} was removed outside ciform");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a recorded resource
    pub fn delete(&self, address: &str, record: &Record) -> Result<()> {
        match record {
            Record::Project(r) => {
                let managed = Managed {
                    id: r.id.clone(),
                    declared: declare_project(address, &r.entry)?,
                    computed: ProjectComputed {
                        reponame: r.reponame.clone(),
                    },
                };
                self.project.delete(&self.projects, managed)?;
            }
            Record::SshKey(r) => {
                let managed = Managed {
                    id: r.id.clone(),
                    declared: declare_recorded_key(address, &r.entry)?,
                    computed: SshKeyComputed {
                        hostname: r.hostname.clone(),
                        fingerprint: r.fingerprint.clone(),
                    },
                };
                self.ssh_key.delete(&self.ssh_keys, managed)?;
            }
        }
        Ok(())
    }

    /// Probe a recorded resource without changing anything
    pub fn status(&self, address: &str, record: &Record) -> Result<Status> {
        let entry = record.entry();
        let expected = identify(address, &entry, self.organization())?;
        if &expected != record.id() {
            return Ok(Status::Moved { identity: expected });
        }

        let read = match record {
            Record::Project(r) => self
                .project
                .read(&self.projects, declare_project(address, &r.entry)?)
                .map(|outcome| outcome.drift),
            Record::SshKey(r) => self
                .ssh_key
                .read(&self.ssh_keys, self.declare_ssh_key(address, &r.entry)?)
                .map(|outcome| outcome.drift),
        };

        match read {
            Ok(drift) => Ok(Status::Present { drift }),
            Err(e) if e.is_gone() => Ok(Status::Gone),
            Err(e) => Err(e),
        }
    }

    /// Import an existing remote resource under a manifest entry.
    ///
    /// The identifier must name the same resource the entry declares.
    pub fn import(&self, address: &str, entry: &Entry, identifier: &str) -> Result<Record> {
        let expected = identify(address, entry, self.organization())?;
        check_identifier(kind_name(entry), identifier, address, &expected)?;

        match entry {
            Entry::Project(p) => {
                let outcome = self.project.import(&self.projects, identifier, ())?;
                Ok(project_record(outcome.resource, p))
            }
            Entry::SshKey(k) => {
                let declared = self.declare_ssh_key(address, k)?;
                let seed = SshKeySeed {
                    hostname: declared.hostname,
                    private_key: declared.private_key,
                };
                let outcome = self.ssh_key.import(&self.ssh_keys, identifier, seed)?;
                Ok(ssh_key_record(outcome.resource, k))
            }
        }
    }

    fn declare_ssh_key(&self, address: &str, entry: &SshKeyEntry) -> Result<DeclaredSshKey> {
        declare_ssh_key(address, entry, self.organization())
    }
}

/// Re-derive the identifier an entry resolves to, without remote calls
pub fn identify(address: &str, entry: &Entry, organization: Option<&str>) -> Result<ResourceId> {
    match entry {
        Entry::Project(p) => Reconciler::new(ProjectKind::default())
            .identify_under(organization, &declare_project(address, p)?),
        Entry::SshKey(k) => Reconciler::new(SshKeyKind::default())
            .identify_under(organization, &declare_ssh_key(address, k, organization)?),
    }
}

fn kind_name(entry: &Entry) -> &'static str {
    match entry {
        Entry::Project(_) => PROJECT_SCHEME.kind(),
        Entry::SshKey(_) => SSH_KEY_SCHEME.kind(),
    }
}

/// Load the key file an entry points at
fn declare_ssh_key(
    address: &str,
    entry: &SshKeyEntry,
    organization: Option<&str>,
) -> Result<DeclaredSshKey> {
    let path = &entry.private_key_file;
    let private_key = PrivateKey::from_file(path).map_err(|e| Error::InvalidKeyMaterial {
        organization: entry
            .organization
            .as_deref()
            .or(organization)
            .unwrap_or_default()
            .to_string(),
        project: entry.project.clone(),
        message: format!("cannot read {}: {e}", path.display()),
    })?;
    ssh_key_declaration(address, entry, private_key)
}

/// Declaration of a recorded key about to be deleted.
///
/// Deletion targets the recorded fingerprint, so the key file may be gone.
fn declare_recorded_key(address: &str, entry: &SshKeyEntry) -> Result<DeclaredSshKey> {
    let private_key = PrivateKey::from_file(&entry.private_key_file).unwrap_or_else(|e| {
        log::debug!(
            "{address}: cannot read {}: {e}",
            entry.private_key_file.display()
        );
        PrivateKey::new(String::new())
    });
    ssh_key_declaration(address, entry, private_key)
}

fn ssh_key_declaration(
    address: &str,
    entry: &SshKeyEntry,
    private_key: PrivateKey,
) -> Result<DeclaredSshKey> {
    DeclaredSshKey::new(
        entry.organization.clone(),
        entry.project.clone(),
        entry.hostname.clone(),
        private_key,
    )
    .map_err(|e| Error::malformed(SSH_KEY_SCHEME.kind(), address, e.to_string()))
}

fn declare_project(address: &str, entry: &ProjectEntry) -> Result<DeclaredProject> {
    DeclaredProject::new(entry.organization.clone(), entry.project.clone())
        .map_err(|e| Error::malformed(PROJECT_SCHEME.kind(), address, e.to_string()))
}

fn check_identifier(
    kind: &'static str,
    identifier: &str,
    address: &str,
    expected: &ResourceId,
) -> Result<()> {
    if identifier == expected.as_str() {
        return Ok(());
    }
    Err(Error::malformed(
        kind,
        identifier,
        format!("{address} is declared as '{expected}'"),
    ))
}

fn project_record(
    managed: Managed<DeclaredProject, ProjectComputed>,
    entry: &ProjectEntry,
) -> Record {
    Record::Project(ProjectRecord {
        id: managed.id,
        entry: entry.clone(),
        reponame: managed.computed.reponame,
    })
}

fn ssh_key_record(
    managed: Managed<DeclaredSshKey, SshKeyComputed>,
    entry: &SshKeyEntry,
) -> Record {
    Record::SshKey(SshKeyRecord {
        id: managed.id,
        entry: entry.clone(),
        hostname: managed.computed.hostname,
        fingerprint: managed.computed.fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::fingerprint;
    use circleci::MockBackend;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const DEPLOY_RSA: &str = include_str!("../../testdata/deploy_rsa.pem");
    const DEPLOY_ID: &str = "acme.widgets.9e825a20b4bc544ae304c964f506bafa";
    const OTHER_RSA: &str = include_str!("../../testdata/other_rsa.pem");
    const OTHER_ID: &str = "acme.widgets.83df7471e2d2c9f5ac5fbc62cb37116f";

    pub(crate) fn backend() -> MockBackend {
        MockBackend::new()
            .with_fingerprinter(|pem| fingerprint::fingerprint(pem).map_err(|e| e.to_string()))
    }

    pub(crate) fn project_entry(project: &str) -> Entry {
        Entry::Project(ProjectEntry {
            organization: None,
            project: project.to_string(),
        })
    }

    pub(crate) fn key_entry(dir: &TempDir) -> Entry {
        let path = dir.path().join("deploy.pem");
        fs::write(&path, DEPLOY_RSA).unwrap();
        Entry::SshKey(SshKeyEntry {
            organization: None,
            project: "widgets".to_string(),
            hostname: "github.com".to_string(),
            private_key_file: path,
        })
    }

    #[test]
    fn test_create_and_status() {
        let mock = backend();
        let provider = Provider::new(&mock, Vcs::GitHub, Some("acme"));
        let dir = TempDir::new().unwrap();

        let record = provider.create("project.widgets", &project_entry("widgets")).unwrap();
        assert_eq!(record.id().as_str(), "acme.widgets");

        let key = provider.create("ssh_key.deploy", &key_entry(&dir)).unwrap();
        assert_eq!(key.id().as_str(), DEPLOY_ID);

        assert!(matches!(
            provider.status("project.widgets", &record).unwrap(),
            Status::Present { drift } if drift.is_empty()
        ));
        assert!(matches!(
            provider.status("ssh_key.deploy", &key).unwrap(),
            Status::Present { .. }
        ));
    }

    #[test]
    fn test_status_gone_after_out_of_band_removal() {
        let mock = backend();
        let provider = Provider::new(&mock, Vcs::GitHub, Some("acme"));

        let record = provider.create("project.widgets", &project_entry("widgets")).unwrap();
        mock.unfollow(Vcs::GitHub, "acme", "widgets").unwrap();

        assert!(matches!(
            provider.status("project.widgets", &record).unwrap(),
            Status::Gone
        ));
    }

    #[test]
    fn test_refresh_of_gone_resource_creates_nothing() {
        let mock = backend();
        let provider = Provider::new(&mock, Vcs::GitHub, Some("acme"));
        let entry = project_entry("widgets");

        let record = provider.create("project.widgets", &entry).unwrap();
        mock.unfollow(Vcs::GitHub, "acme", "widgets").unwrap();

        let refreshed = provider.refresh("project.widgets", &entry, &record).unwrap();
        assert!(refreshed.is_none());
        assert_eq!(mock.project_count(), 0);
    }

    #[test]
    fn test_refresh_refuses_moved_identity() {
        let mock = backend();
        let acme = Provider::new(&mock, Vcs::GitHub, Some("acme"));
        let entry = project_entry("widgets");
        let record = acme.create("project.widgets", &entry).unwrap();

        let globex = Provider::new(&mock, Vcs::GitHub, Some("globex"));
        let calls = mock.calls();
        let err = globex.refresh("project.widgets", &entry, &record).unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }));
        assert!(err.to_string().contains("globex.widgets"));
        assert_eq!(mock.calls(), calls);
        assert!(mock.get_project("acme", "widgets").unwrap().is_some());
        assert!(mock.get_project("globex", "widgets").unwrap().is_none());
    }

    #[test]
    fn test_status_reports_moved_identity() {
        let mock = backend();
        let provider = Provider::new(&mock, Vcs::GitHub, Some("acme"));
        let dir = TempDir::new().unwrap();
        let entry = key_entry(&dir);
        let record = provider.create("ssh_key.deploy", &entry).unwrap();

        // Key rotated in place
        let Entry::SshKey(k) = &entry else {
            unreachable!()
        };
        fs::write(&k.private_key_file, OTHER_RSA).unwrap();

        match provider.status("ssh_key.deploy", &record).unwrap() {
            Status::Moved { identity } => {
                assert_eq!(identity.as_str(), OTHER_ID);
            }
            other => panic!("Expected Status::Moved, got {other:?}"),
        }
    }

    #[test]
    fn test_identify_without_backend() {
        let dir = TempDir::new().unwrap();
        let id = identify("ssh_key.deploy", &key_entry(&dir), Some("acme")).unwrap();
        assert_eq!(id.as_str(), DEPLOY_ID);

        let id = identify("project.widgets", &project_entry("widgets"), Some("globex")).unwrap();
        assert_eq!(id.as_str(), "globex.widgets");
        assert!(identify("project.widgets", &project_entry("widgets"), None).is_err());
    }

    #[test]
    fn test_delete_record() {
        let mock = backend();
        let provider = Provider::new(&mock, Vcs::GitHub, Some("acme"));
        let dir = TempDir::new().unwrap();

        let key = provider.create("ssh_key.deploy", &key_entry(&dir)).unwrap();
        provider.delete("ssh_key.deploy", &key).unwrap();
        assert!(mock.ssh_keys("acme", "widgets").is_empty());

        // Deleting again succeeds
        provider.delete("ssh_key.deploy", &key).unwrap();
    }

    #[test]
    fn test_delete_record_without_key_file() {
        let mock = backend();
        let provider = Provider::new(&mock, Vcs::GitHub, Some("acme"));
        let dir = TempDir::new().unwrap();
        let entry = key_entry(&dir);

        let key = provider.create("ssh_key.deploy", &entry).unwrap();
        let Entry::SshKey(k) = &entry else {
            unreachable!()
        };
        fs::remove_file(&k.private_key_file).unwrap();

        provider.delete("ssh_key.deploy", &key).unwrap();
        assert!(mock.ssh_keys("acme", "widgets").is_empty());
    }

    #[test]
    fn test_missing_key_file() {
        let mock = backend();
        let provider = Provider::new(&mock, Vcs::GitHub, Some("acme"));
        let entry = Entry::SshKey(SshKeyEntry {
            organization: None,
            project: "widgets".to_string(),
            hostname: "github.com".to_string(),
            private_key_file: PathBuf::from("/nonexistent/deploy.pem"),
        });

        let err = provider.create("ssh_key.deploy", &entry).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyMaterial { .. }));
        let message = err.to_string();
        assert!(message.contains("acme/widgets"));
        assert!(message.contains("/nonexistent/deploy.pem"));
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_missing_organization() {
        let mock = backend();
        let provider = Provider::new(&mock, Vcs::GitHub, None);
        let err = provider
            .create("project.widgets", &project_entry("widgets"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingOrganization { .. }));
    }

    #[test]
    fn test_import_checks_identifier() {
        let mock = backend();
        mock.seed_project(Vcs::GitHub, "acme", "widgets");
        let provider = Provider::new(&mock, Vcs::GitHub, Some("acme"));

        let record = provider
            .import("project.widgets", &project_entry("widgets"), "acme.widgets")
            .unwrap();
        assert_eq!(record.id().as_str(), "acme.widgets");

        let err = provider
            .import("project.widgets", &project_entry("widgets"), "acme.gadgets")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }));
        assert!(err.to_string().contains("project.widgets"));
    }

    #[test]
    fn test_import_ssh_key() {
        let mock = backend();
        mock.seed_ssh_key(
            "acme",
            "widgets",
            "github.com",
            "9e:82:5a:20:b4:bc:54:4a:e3:04:c9:64:f5:06:ba:fa",
        );
        let provider = Provider::new(&mock, Vcs::GitHub, Some("acme"));
        let dir = TempDir::new().unwrap();

        let record = provider
            .import("ssh_key.deploy", &key_entry(&dir), DEPLOY_ID)
            .unwrap();
        match record {
            Record::SshKey(r) => {
                assert_eq!(r.hostname, "github.com");
                assert_eq!(r.fingerprint, "9e:82:5a:20:b4:bc:54:4a:e3:04:c9:64:f5:06:ba:fa");
            }
            other => panic!("Expected SSH key record, got {other:?}"),
        }
    }
}
