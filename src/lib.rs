//! # Pangrosan - priority-ranked IP and domain allow/block lists
//!
//! Answers "is this IP or domain allowed, blocked, or unknown?" against six
//! ranked lists, and turns blacklisted domains into IP entries without ever
//! blocking shared, infrastructure or reserved addresses.
//!
//! ## Precedence
//!
//! ```text
//!  rank  list                     file                    action
//!  ────  ───────────────────────  ──────────────────────  ───────
//!   1    whitelist-ip-specific    whitelist-specific.txt  ALLOWED
//!   2    blacklist-ip-specific    blacklist-specific.txt  BLOCKED
//!   3    blacklist-ip-segment     drop.txt                BLOCKED
//!   4    whitelist-ip-segment     pass.txt                ALLOWED
//!   5    whitelist-domain         whitelist.txt           ALLOWED
//!   6    blacklist-domain         blacklist.txt           BLOCKED
//! ```
//!
//! The lowest rank that matches decides. Nothing matching is `UNKNOWN`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (clap): lookup, resolve, whois, stats                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml) + list store (tempfile atomic writes)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ClassificationEngine                                       │
//! │    └── PriorityList x6 (ipnet CIDR + domain suffix match)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ResolutionPipeline                                         │
//! │    ├── ConcurrentResolver (tokio + futures, bounded)        │
//! │    └── ProtectionFilter (shared IP, infrastructure, bogon)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  WhoisCache (display-only enrichment)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use pangrosan::config::Config;
//! use pangrosan::engine::ClassificationEngine;
//! use pangrosan::pipeline::ResolutionPipeline;
//! use pangrosan::priority::ListKind;
//! use pangrosan::resolver::{ConcurrentResolver, SystemResolver};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_or_default("config.yml")?;
//!
//!     let engine = ClassificationEngine::load(&config);
//!     println!("{}", engine.classify("8.8.8.8").effective_action);
//!
//!     let resolver = ConcurrentResolver::new(
//!         SystemResolver::new(config.resolver.concurrency),
//!         config.resolver.clone(),
//!     );
//!     let mut pipeline = ResolutionPipeline::new(resolver, &config.label_prefix);
//!     let output = pipeline
//!         .run(
//!             engine.list(ListKind::BlacklistDomain),
//!             engine.list(ListKind::WhitelistDomain),
//!             config.resolver.concurrency,
//!         )
//!         .await;
//!     println!("{} new blacklist IPs", output.survivors.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`address`] - IP/CIDR parsing and prefix containment
//! - [`priority`] - List kinds, ranks and per-list matching
//! - [`engine`] - Cross-list classification
//! - [`protection`] - Triple protection filter and its tables
//! - [`resolver`] - Bounded-concurrency name resolution
//! - [`pipeline`] - Blacklist domain to IP resolution
//! - [`whois`] - Whois display cache
//! - [`store`] - List file reading, writing and reconciliation
//! - [`config`] - Configuration parsing and validation
//! - [`stats`] - Last-run summary persistence
//! - [`lock`] - File locking for concurrent runs
//! - [`cli`] / [`commands`] - Command-line interface

pub mod address;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod pipeline;
pub mod priority;
pub mod protection;
pub mod resolver;
pub mod stats;
pub mod store;
pub mod utils;
pub mod whois;

pub use config::Config;
pub use engine::{ClassificationEngine, ClassificationResult};
pub use error::{PangrosanError, Result};
pub use priority::{Action, ListKind};
