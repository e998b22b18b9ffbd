//! Project SSH key resource
//!
//! The fingerprint is never declared. It is derived from the private key on
//! every operation, so the key material must be available to read, delete
//! and import the resource. The identity is
//! `<organization>.<project>.<fingerprint without colons>`; the hostname is
//! not part of it but still has to match for a remote key to count.

use super::fingerprint;
use circleci::{ProjectSettings, SshKeyApi, Vcs};
use declarative::{
    AttributeDrift, BoxError, Error, Field, IdentityParts, IdentityScheme, ResourceKind, Result,
};
use std::fmt;
use std::path::Path;

/// Identity layout of project SSH keys
pub static SSH_KEY_SCHEME: IdentityScheme = IdentityScheme::new(
    "circleci_ssh_key",
    &[
        Field::verbatim("organization"),
        Field::verbatim("project"),
        Field::stripped("fingerprint", ':'),
    ],
);

/// PEM private key material. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(pem: impl Into<String>) -> Self {
        Self(pem.into())
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        std::fs::read_to_string(path).map(Self::new)
    }

    /// The raw PEM text
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// An SSH key as declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredSshKey {
    pub organization: Option<String>,
    pub project: String,
    /// Host the key is used for, e.g. `github.com`
    pub hostname: String,
    pub private_key: PrivateKey,
}

impl DeclaredSshKey {
    pub fn new(
        organization: Option<String>,
        project: impl Into<String>,
        hostname: impl Into<String>,
        private_key: PrivateKey,
    ) -> anyhow::Result<Self> {
        let project = project.into();
        let hostname = hostname.into();
        anyhow::ensure!(!project.is_empty(), "project name must not be empty");
        anyhow::ensure!(!hostname.is_empty(), "hostname must not be empty");
        Ok(Self {
            organization: organization.filter(|o| !o.is_empty()),
            project,
            hostname,
            private_key,
        })
    }
}

/// An SSH key with organization and fingerprint resolved
#[derive(Debug, Clone)]
pub struct ResolvedSshKey {
    pub organization: String,
    pub project: String,
    pub hostname: String,
    pub fingerprint: String,
    /// Absent when rebuilt from a record, which can only delete
    private_key: Option<PrivateKey>,
}

impl fmt::Display for ResolvedSshKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) on {}/{}",
            self.fingerprint, self.hostname, self.organization, self.project
        )
    }
}

/// Attributes reported by CircleCI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyComputed {
    pub hostname: String,
    /// Colon-separated MD5 fingerprint
    pub fingerprint: String,
}

/// What an import needs besides the identifier
#[derive(Debug, Clone)]
pub struct SshKeySeed {
    pub hostname: String,
    pub private_key: PrivateKey,
}

/// Project SSH key kind, bound to one VCS
#[derive(Debug, Clone, Copy, Default)]
pub struct SshKeyKind {
    pub vcs: Vcs,
}

impl SshKeyKind {
    pub fn new(vcs: Vcs) -> Self {
        Self { vcs }
    }
}

fn invalid_key(organization: &str, project: &str, message: impl fmt::Display) -> Error {
    Error::InvalidKeyMaterial {
        organization: organization.to_string(),
        project: project.to_string(),
        message: message.to_string(),
    }
}

impl ResourceKind for SshKeyKind {
    type Client = dyn SshKeyApi;
    type Declared = DeclaredSshKey;
    type Resolved = ResolvedSshKey;
    type Observed = ProjectSettings;
    type Computed = SshKeyComputed;
    type Seed = SshKeySeed;

    fn scheme(&self) -> &'static IdentityScheme {
        &SSH_KEY_SCHEME
    }

    fn label(&self, declared: &DeclaredSshKey) -> String {
        format!("{} ({})", declared.project, declared.hostname)
    }

    fn organization<'d>(&self, declared: &'d DeclaredSshKey) -> Option<&'d str> {
        declared.organization.as_deref()
    }

    fn resolve(&self, declared: &DeclaredSshKey, organization: String) -> Result<ResolvedSshKey> {
        let fingerprint = fingerprint::fingerprint(declared.private_key.expose())
            .map_err(|e| invalid_key(&organization, &declared.project, e))?;

        Ok(ResolvedSshKey {
            organization,
            project: declared.project.clone(),
            hostname: declared.hostname.clone(),
            fingerprint,
            private_key: Some(declared.private_key.clone()),
        })
    }

    fn identity<'r>(&self, resolved: &'r ResolvedSshKey) -> Vec<&'r str> {
        vec![
            &resolved.organization,
            &resolved.project,
            &resolved.fingerprint,
        ]
    }

    fn fetch_remote(
        &self,
        client: &dyn SshKeyApi,
        resolved: &ResolvedSshKey,
    ) -> std::result::Result<Option<ProjectSettings>, BoxError> {
        let settings = client.get_settings(self.vcs, &resolved.organization, &resolved.project)?;
        Ok(Some(settings))
    }

    fn check_conflict(&self, resolved: &ResolvedSshKey, observed: &ProjectSettings) -> Result<()> {
        match observed.key_with_fingerprint(&resolved.fingerprint) {
            Some(existing) => Err(Error::DuplicateKey {
                organization: resolved.organization.clone(),
                project: resolved.project.clone(),
                fingerprint: resolved.fingerprint.clone(),
                hostname: existing.hostname.clone(),
            }),
            None => Ok(()),
        }
    }

    fn create_remote(
        &self,
        client: &dyn SshKeyApi,
        resolved: &ResolvedSshKey,
    ) -> std::result::Result<(), BoxError> {
        let private_key = resolved
            .private_key
            .as_ref()
            .ok_or("no private key material to upload")?;
        client.add_ssh_key(
            self.vcs,
            &resolved.organization,
            &resolved.project,
            &resolved.hostname,
            private_key.expose(),
        )?;
        Ok(())
    }

    fn recorded(&self, parts: IdentityParts, computed: &SshKeyComputed) -> Result<ResolvedSshKey> {
        let organization = parts.get("organization").unwrap_or_default().to_string();
        let project = parts.get("project").unwrap_or_default().to_string();
        let expected = parts.get("fingerprint").unwrap_or_default();

        if !computed.fingerprint.replace(':', "").eq_ignore_ascii_case(expected) {
            return Err(Error::malformed(
                self.name(),
                format!("{organization}.{project}.{expected}"),
                format!("recorded fingerprint is {}", computed.fingerprint),
            ));
        }

        Ok(ResolvedSshKey {
            organization,
            project,
            hostname: computed.hostname.clone(),
            fingerprint: computed.fingerprint.clone(),
            private_key: None,
        })
    }

    fn delete_remote(
        &self,
        client: &dyn SshKeyApi,
        resolved: &ResolvedSshKey,
    ) -> std::result::Result<(), BoxError> {
        client.delete_ssh_key(
            self.vcs,
            &resolved.organization,
            &resolved.project,
            &resolved.hostname,
            &resolved.fingerprint,
        )?;
        Ok(())
    }

    fn match_observed(
        &self,
        resolved: &ResolvedSshKey,
        observed: &ProjectSettings,
    ) -> Option<SshKeyComputed> {
        observed
            .key(&resolved.fingerprint, &resolved.hostname)
            .map(|key| SshKeyComputed {
                hostname: key.hostname.clone(),
                fingerprint: key.fingerprint.clone(),
            })
    }

    fn computed(&self, resolved: &ResolvedSshKey) -> SshKeyComputed {
        SshKeyComputed {
            hostname: resolved.hostname.clone(),
            fingerprint: resolved.fingerprint.clone(),
        }
    }

    fn refresh(
        &self,
        declared: &mut DeclaredSshKey,
        computed: &SshKeyComputed,
    ) -> Vec<AttributeDrift> {
        let drift = AttributeDrift::compare("hostname", &declared.hostname, &computed.hostname);
        declared.hostname.clone_from(&computed.hostname);
        drift.into_iter().collect()
    }

    fn from_identity(&self, parts: IdentityParts, seed: SshKeySeed) -> Result<DeclaredSshKey> {
        let organization = parts.get("organization").unwrap_or_default().to_string();
        let project = parts.get("project").unwrap_or_default().to_string();
        let expected = parts.get("fingerprint").unwrap_or_default();

        let derived = fingerprint::fingerprint(seed.private_key.expose())
            .map_err(|e| invalid_key(&organization, &project, e))?;
        if !derived.replace(':', "").eq_ignore_ascii_case(expected) {
            return Err(invalid_key(
                &organization,
                &project,
                format!(
                    "key fingerprint {derived} does not match identifier fingerprint {expected}"
                ),
            ));
        }

        Ok(DeclaredSshKey {
            organization: Some(organization).filter(|o| !o.is_empty()),
            project,
            hostname: seed.hostname,
            private_key: seed.private_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circleci::MockBackend;
    use declarative::{ProviderContext, Reconciler};
    use rsa::RsaPrivateKey;
    use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};

    const DEPLOY_RSA: &str = include_str!("../../testdata/deploy_rsa.pem");
    const DEPLOY_PKCS8: &str = include_str!("../../testdata/deploy_pkcs8.pem");
    const OTHER_RSA: &str = include_str!("../../testdata/other_rsa.pem");

    const DEPLOY_FINGERPRINT: &str = "9e:82:5a:20:b4:bc:54:4a:e3:04:c9:64:f5:06:ba:fa";
    const DEPLOY_ID: &str = "acme.widgets.9e825a20b4bc544ae304c964f506bafa";

    fn backend() -> MockBackend {
        MockBackend::new()
            .with_fingerprinter(|pem| fingerprint::fingerprint(pem).map_err(|e| e.to_string()))
    }

    fn reconciler() -> Reconciler<SshKeyKind> {
        Reconciler::new(SshKeyKind::new(Vcs::GitHub))
    }

    fn key(pem: &str, hostname: &str) -> DeclaredSshKey {
        DeclaredSshKey::new(
            Some("acme".to_string()),
            "widgets",
            hostname,
            PrivateKey::new(pem),
        )
        .unwrap()
    }

    fn seed(pem: &str) -> SshKeySeed {
        SshKeySeed {
            hostname: "github.com".to_string(),
            private_key: PrivateKey::new(pem),
        }
    }

    #[test]
    fn test_declared_key_validation() {
        let pk = PrivateKey::new(DEPLOY_RSA);
        assert!(DeclaredSshKey::new(None, "", "github.com", pk.clone()).is_err());
        assert!(DeclaredSshKey::new(None, "widgets", "", pk.clone()).is_err());
        assert!(DeclaredSshKey::new(None, "widgets", "github.com", pk).is_ok());
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let declared = key(DEPLOY_RSA, "github.com");
        let debug = format!("{declared:?}");
        assert!(!debug.contains("BEGIN RSA PRIVATE KEY"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_create_generated_4096_bit_key() {
        let generated = RsaPrivateKey::new(&mut rand::rngs::OsRng, 4096).unwrap();
        let pem = generated.to_pkcs1_pem(LineEnding::LF).unwrap();
        let expected = fingerprint::fingerprint(&pem).unwrap();

        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);
        let managed = reconciler().create(&ctx, key(&pem, "github.com")).unwrap();

        assert_eq!(
            managed.id.as_str(),
            format!("acme.widgets.{}", expected.replace(':', ""))
        );
        assert_eq!(managed.computed.fingerprint, expected);
        assert_eq!(managed.computed.hostname, "github.com");

        let remote = mock.ssh_keys("acme", "widgets");
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].fingerprint, expected);
    }

    #[test]
    fn test_create_fixture_key() {
        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);
        let managed = reconciler().create(&ctx, key(DEPLOY_RSA, "github.com")).unwrap();
        assert_eq!(managed.id.as_str(), DEPLOY_ID);
    }

    #[test]
    fn test_create_same_key_twice_is_duplicate() {
        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);
        let reconciler = reconciler();

        reconciler.create(&ctx, key(DEPLOY_RSA, "github.com")).unwrap();
        let err = reconciler
            .create(&ctx, key(DEPLOY_RSA, "github.com"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));

        // The PKCS#8 encoding of the same key collides too
        let err = reconciler
            .create(&ctx, key(DEPLOY_PKCS8, "github.com"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
        assert_eq!(mock.ssh_keys("acme", "widgets").len(), 1);
    }

    #[test]
    fn test_duplicate_ignores_hostname() {
        let mock = backend();
        mock.seed_ssh_key("acme", "widgets", "gitlab.com", DEPLOY_FINGERPRINT);
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);

        let err = reconciler()
            .create(&ctx, key(DEPLOY_RSA, "github.com"))
            .unwrap_err();
        match &err {
            Error::DuplicateKey {
                fingerprint,
                hostname,
                ..
            } => {
                assert_eq!(fingerprint, DEPLOY_FINGERPRINT);
                assert_eq!(hostname, "gitlab.com");
            }
            other => panic!("Expected DuplicateKey, got {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("acme/widgets"));
        assert!(message.contains(DEPLOY_FINGERPRINT));
    }

    #[test]
    fn test_read_requires_matching_hostname() {
        let mock = backend();
        mock.seed_ssh_key("acme", "widgets", "gitlab.com", DEPLOY_FINGERPRINT);
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);
        let reconciler = reconciler();

        let err = reconciler
            .read(&ctx, key(DEPLOY_RSA, "github.com"))
            .unwrap_err();
        assert!(matches!(err, Error::ResourceGone { .. }));
        assert!(!reconciler.exists(&ctx, &key(DEPLOY_RSA, "github.com")).unwrap());
        assert!(reconciler.exists(&ctx, &key(DEPLOY_RSA, "gitlab.com")).unwrap());
    }

    #[test]
    fn test_read_after_create() {
        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);
        let reconciler = reconciler();

        reconciler.create(&ctx, key(DEPLOY_RSA, "github.com")).unwrap();
        let outcome = reconciler.read(&ctx, key(DEPLOY_RSA, "github.com")).unwrap();
        assert_eq!(outcome.resource.id.as_str(), DEPLOY_ID);
        assert_eq!(outcome.resource.computed.fingerprint, DEPLOY_FINGERPRINT);
        assert!(!outcome.has_drift());
    }

    #[test]
    fn test_invalid_key_makes_no_calls() {
        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);

        let err = reconciler()
            .create(&ctx, key("not a key", "github.com"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKeyMaterial { .. }));
        assert!(err.to_string().contains("acme/widgets"));
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);
        let reconciler = reconciler();

        let managed = reconciler.create(&ctx, key(DEPLOY_RSA, "github.com")).unwrap();
        assert!(reconciler.exists(&ctx, &key(DEPLOY_RSA, "github.com")).unwrap());

        reconciler.delete(&ctx, managed.clone()).unwrap();
        assert!(!reconciler.exists(&ctx, &key(DEPLOY_RSA, "github.com")).unwrap());
        reconciler.delete(&ctx, managed).unwrap();
        assert!(mock.ssh_keys("acme", "widgets").is_empty());
    }

    #[test]
    fn test_delete_leaves_other_keys() {
        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);
        let reconciler = reconciler();

        let deploy = reconciler.create(&ctx, key(DEPLOY_RSA, "github.com")).unwrap();
        reconciler.create(&ctx, key(OTHER_RSA, "github.com")).unwrap();

        reconciler.delete(&ctx, deploy).unwrap();
        assert!(reconciler.exists(&ctx, &key(OTHER_RSA, "github.com")).unwrap());
        assert_eq!(mock.ssh_keys("acme", "widgets").len(), 1);
    }

    #[test]
    fn test_delete_targets_recorded_fingerprint() {
        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);
        let reconciler = reconciler();

        let mut managed = reconciler.create(&ctx, key(DEPLOY_RSA, "github.com")).unwrap();
        // Key material rotated after the key was uploaded
        managed.declared = key(OTHER_RSA, "github.com");

        reconciler.delete(&ctx, managed).unwrap();
        assert!(mock.ssh_keys("acme", "widgets").is_empty());
    }

    #[test]
    fn test_delete_rejects_inconsistent_record() {
        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);
        let reconciler = reconciler();

        let mut managed = reconciler.create(&ctx, key(DEPLOY_RSA, "github.com")).unwrap();
        managed.computed.fingerprint = "00:11:22:33:44:55:66:77:88:99:aa:bb:cc:dd:ee:ff".into();

        let err = reconciler.delete(&ctx, managed).unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }));
        assert_eq!(mock.ssh_keys("acme", "widgets").len(), 1);
    }

    #[test]
    fn test_import() {
        let mock = backend();
        mock.seed_ssh_key("acme", "widgets", "github.com", DEPLOY_FINGERPRINT);
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);

        let outcome = reconciler()
            .import(&ctx, DEPLOY_ID, seed(DEPLOY_RSA))
            .unwrap();
        assert_eq!(outcome.resource.id.as_str(), DEPLOY_ID);
        assert_eq!(outcome.resource.declared.organization.as_deref(), Some("acme"));
        assert_eq!(outcome.resource.declared.project, "widgets");
        assert_eq!(outcome.resource.computed.hostname, "github.com");
    }

    #[test]
    fn test_import_with_wrong_key() {
        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);

        let err = reconciler()
            .import(&ctx, DEPLOY_ID, seed(OTHER_RSA))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKeyMaterial { .. }));
        assert!(err.to_string().contains("does not match"));
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_import_wrong_arity() {
        let mock = backend();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);

        let err = reconciler()
            .import(&ctx, "acme.widgets", seed(DEPLOY_RSA))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }));
    }

    #[test]
    fn test_transport_error_on_add() {
        let mock = MockBackend::new();
        let ctx = ProviderContext::<dyn SshKeyApi>::new(&mock);

        // Without a fingerprinter the mock rejects every added key
        let err = reconciler()
            .create(&ctx, key(DEPLOY_RSA, "github.com"))
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(err.to_string().contains(DEPLOY_FINGERPRINT));
    }
}
