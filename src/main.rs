mod cli;
mod commands;
mod engine;
mod manifest;
mod resource;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ProviderArgs};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub manifest: PathBuf,
    pub state: Option<PathBuf>,
    pub provider: ProviderArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        manifest: cli.manifest,
        state: cli.state,
        provider: cli.provider,
    };

    match cli.command {
        Command::Plan(args) => commands::apply::plan(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::apply::apply(
            &ctx,
            &commands::apply::ApplyOptions {
                target: args.target.as_deref(),
                dry_run: args.dry_run,
                jobs: args.jobs,
                yes: args.yes,
            },
        ),
        Command::Status => commands::status::run(&ctx),
        Command::Import {
            address,
            identifier,
        } => commands::import::run(&ctx, &address, &identifier),
        Command::Destroy { yes } => commands::apply::destroy(&ctx, yes),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "ciform", &mut io::stdout());
            Ok(())
        }
    }
}
