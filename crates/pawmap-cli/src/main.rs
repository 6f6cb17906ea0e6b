//! Pawmap CLI - report and follow animal-welfare incidents from the terminal
//!
//! Reports made while the server is unreachable are kept in an offline cache
//! and pushed later.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::cache::run_cache;
use crate::commands::clear::run_clear;
use crate::commands::common::resolve_cache_dir;
use crate::commands::completions::run_completions;
use crate::commands::list::run_list;
use crate::commands::push::run_push;
use crate::commands::report::run_report;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pawmap_cli=warn".parse().expect("valid directive"))
                .add_directive("pawmap_core=warn".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let server = cli.server.as_str();

    match cli.command {
        Commands::List { limit, json } => {
            let cache_dir = resolve_cache_dir(cli.cache_dir)?;
            run_list(limit, json, server, &cache_dir).await?;
        }
        Commands::Report(args) => {
            let cache_dir = resolve_cache_dir(cli.cache_dir)?;
            run_report(&args, server, &cache_dir).await?;
        }
        Commands::Push => {
            let cache_dir = resolve_cache_dir(cli.cache_dir)?;
            run_push(server, &cache_dir).await?;
        }
        Commands::Clear { yes } => {
            let cache_dir = resolve_cache_dir(cli.cache_dir)?;
            run_clear(yes, server, &cache_dir).await?;
        }
        Commands::Watch { json } => {
            let cache_dir = resolve_cache_dir(cli.cache_dir)?;
            run_watch(json, server, &cache_dir).await?;
        }
        Commands::Cache { command } => {
            let cache_dir = resolve_cache_dir(cli.cache_dir)?;
            run_cache(&command, &cache_dir)?;
        }
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
