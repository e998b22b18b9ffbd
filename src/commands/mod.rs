// Plan, apply and destroy
pub mod apply;

// Adopting existing resources
pub mod import;

// Drift detection
pub mod status;

use crate::Context;
use crate::manifest::Manifest;
use crate::state::CiformState;
use anyhow::{Result, bail};
use circleci::{HttpBackend, Vcs};
use std::path::PathBuf;
use std::time::Duration;

/// Manifest plus the state file that goes with it
pub struct Workspace {
    pub manifest: Manifest,
    pub state_path: PathBuf,
}

impl Workspace {
    pub fn load(ctx: &Context) -> Result<Self> {
        let manifest = Manifest::load(&ctx.manifest)?;
        let state_path = ctx
            .state
            .clone()
            .unwrap_or_else(|| CiformState::default_path(&ctx.manifest));
        Ok(Self {
            manifest,
            state_path,
        })
    }

    pub fn load_state(&self) -> Result<CiformState> {
        CiformState::load(&self.state_path)
    }

    /// VCS from the command line, falling back to the manifest
    pub fn vcs(&self, ctx: &Context) -> Vcs {
        ctx.provider.vcs_type.unwrap_or(self.manifest.provider.vcs_type)
    }

    /// Default organization from the command line, falling back to the manifest
    pub fn organization<'a>(&'a self, ctx: &'a Context) -> Option<&'a str> {
        ctx.provider
            .organization
            .as_deref()
            .or(self.manifest.provider.organization.as_deref())
            .filter(|org| !org.is_empty())
    }

    /// Build the API backend, resolving the token from flags or the environment
    pub fn backend(&self, ctx: &Context) -> Result<HttpBackend> {
        let provider = &self.manifest.provider;
        let token = match &ctx.provider.token {
            Some(token) => token.clone(),
            None => match std::env::var(&provider.token_env) {
                Ok(token) => token,
                Err(_) => bail!(
                    "No CircleCI API token: set {} or pass --token",
                    provider.token_env
                ),
            },
        };
        if token.trim().is_empty() {
            bail!("CircleCI API token is empty");
        }

        let backend = match ctx.provider.url.as_deref().or(provider.url.as_deref()) {
            Some(url) => HttpBackend::with_api_base(url, token),
            None => HttpBackend::new(token),
        };
        log::debug!("Using CircleCI API at {}", backend.api_base());

        Ok(match provider.timeout {
            Some(secs) => backend.with_timeout(Duration::from_secs(secs)),
            None => backend,
        })
    }
}
