//! Whois command implementation.

use anyhow::Result;
use std::path::Path;

use crate::cli::WhoisAction;
use crate::commands::lookup::print_whois;
use crate::config::Config;
use crate::utils::{format_count, truncate};
use crate::whois::WhoisCache;

/// Run the whois command
pub fn run(action: WhoisAction, config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let cache = WhoisCache::load(&config.whois_path())?;

    println!();
    match action {
        WhoisAction::Get { ip } => match cache.get(&ip) {
            Some(record) => print_whois(record),
            None => println!("No whois data cached for {}", ip),
        },
        WhoisAction::Search { term } => {
            let hits = cache.search(&term);
            println!("Found {} record(s) matching '{}'", hits.len(), term);
            println!();
            for record in hits {
                println!(
                    "  {:<40} {:<3} {:<10} {}",
                    record.ip.to_string(),
                    record.country,
                    record.asn,
                    truncate(&record.org, 40)
                );
            }
        }
        WhoisAction::Stats => {
            let stats = cache.stats();
            println!("Total IPs: {}", format_count(stats.total));
            for (title, rows) in [
                ("Top countries", &stats.top_countries),
                ("Top organizations", &stats.top_orgs),
                ("Top ASNs", &stats.top_asns),
            ] {
                println!();
                println!("{}:", title);
                for (name, count) in rows {
                    println!("  {:<44} {:>8}", truncate(name, 44), format_count(*count));
                }
            }
        }
    }
    println!();

    Ok(())
}
