//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pangrosan")]
#[command(author, version, about = "Priority-ranked IP and domain allow/block lists")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (defaults apply when absent)
    #[arg(short, long, default_value = "config.yml", global = true)]
    pub config: PathBuf,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify an IP, CIDR or domain against all six lists
    Lookup {
        /// IP address, CIDR or domain
        query: String,

        /// Skip whois display data
        #[arg(long)]
        no_whois: bool,

        /// Do not resolve domains to classify their addresses
        #[arg(long)]
        no_resolve: bool,
    },

    /// Resolve blacklist domains into blacklist-specific IP entries
    Resolve {
        /// Maximum concurrent lookups (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Resolve and report, but do not write any file
        #[arg(long)]
        dry_run: bool,

        /// Resolve whitelist domains into whitelist-specific entries instead
        #[arg(long)]
        whitelist: bool,
    },

    /// Export blacklist domains as a hosts file (0.0.0.0 domain)
    Hosts {
        /// Output path (defaults to the configured hosts file in data_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Query the whois cache
    Whois {
        #[command(subcommand)]
        action: WhoisAction,
    },

    /// Show the last resolution run
    Stats,

    /// Show version
    Version,
}

#[derive(Subcommand)]
pub enum WhoisAction {
    /// Show the cached record for an address
    Get {
        ip: String,
    },
    /// Search by address prefix, org, country code or ASN
    Search {
        term: String,
    },
    /// Top countries, orgs and ASNs
    Stats,
}
