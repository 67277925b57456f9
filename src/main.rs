//! Pangrosan - priority-ranked IP and domain allow/block lists.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use pangrosan::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Lookup {
            query,
            no_whois,
            no_resolve,
        } => pangrosan::commands::lookup::run(&query, !no_whois, !no_resolve, &cli.config).await,
        Commands::Resolve {
            concurrency,
            dry_run,
            whitelist: false,
        } => pangrosan::commands::resolve::run(concurrency, dry_run, &cli.config).await,
        Commands::Resolve {
            concurrency,
            dry_run,
            whitelist: true,
        } => pangrosan::commands::resolve::run_whitelist(concurrency, dry_run, &cli.config).await,
        Commands::Hosts { output } => pangrosan::commands::hosts::run(output, &cli.config),
        Commands::Whois { action } => pangrosan::commands::whois::run(action, &cli.config),
        Commands::Stats => pangrosan::commands::stats::run(&cli.config),
        Commands::Version => {
            println!("pangrosan {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
