use circleci::Vcs;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ciform")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative CircleCI project and SSH key management", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Manifest declaring the desired resources
    #[arg(short, long, global = true, default_value = crate::manifest::DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// State file (default: ciform.state.toml next to the manifest)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    #[command(flatten)]
    pub provider: ProviderArgs,

    #[command(subcommand)]
    pub command: Command,
}

// ============================================================================
// Provider
// ============================================================================

/// Overrides for the manifest's `[provider]` table
#[derive(Args, Debug, Default)]
pub struct ProviderArgs {
    /// CircleCI API token
    #[arg(long, env = "CIRCLECI_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Default organization for resources that do not set one
    #[arg(long, env = "CIRCLECI_ORGANIZATION", global = true)]
    pub organization: Option<String>,

    /// VCS the projects live on: github or bitbucket
    #[arg(long, env = "CIRCLECI_VCS_TYPE", global = true)]
    pub vcs_type: Option<Vcs>,

    /// CircleCI API base URL
    #[arg(long, env = "CIRCLECI_URL", global = true)]
    pub url: Option<String>,
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Create, refresh, replace and delete resources to match the manifest
    Apply(ApplyArgs),

    /// Check every recorded resource against CircleCI
    Status,

    /// Adopt an existing CircleCI resource
    Import {
        /// Manifest address, e.g. project.widgets or ssh_key.deploy
        address: String,

        /// Resource identifier: org.project or org.project.fingerprint
        identifier: String,
    },

    /// Delete every recorded resource
    Destroy {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct PlanArgs {
    /// Only plan a kind or address (e.g. projects, ssh_key.deploy)
    pub target: Option<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Only apply a kind or address (e.g. projects, ssh_key.deploy)
    pub target: Option<String>,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
