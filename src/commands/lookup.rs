//! Lookup command implementation.
//!
//! Classify one query and print every matching list, the effective action,
//! per-address results for domains, and whois display data.

use anyhow::Result;
use std::net::IpAddr;
use std::path::Path;

use crate::config::Config;
use crate::engine::{ClassificationEngine, ClassificationResult, DomainReport};
use crate::priority::{Action, Query};
use crate::resolver::{resolve_ptr, ConcurrentResolver, SystemResolver};
use crate::whois::{WhoisCache, WhoisRecord};

/// Run the lookup command
pub async fn run(query: &str, show_whois: bool, resolve: bool, config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let engine = ClassificationEngine::load(&config);

    let report = if resolve {
        let resolver = ConcurrentResolver::new(
            SystemResolver::new(config.resolver.concurrency),
            config.resolver.clone(),
        );
        engine.classify_with_resolution(query, &resolver).await
    } else {
        DomainReport {
            domain: engine.classify(query),
            resolved: Vec::new(),
        }
    };

    println!();
    println!("Query: {}", report.domain.query);
    if resolve {
        if let Query::Ip(ip) = Query::parse(query) {
            println!("DNS (PTR): {}", resolve_ptr(ip).await);
        }
    }
    println!();
    for line in describe(&report.domain) {
        println!("{}", line);
    }

    if !report.resolved.is_empty() {
        println!();
        println!("=== Resolved addresses ===");
        let conflicts: Vec<&str> = report.conflicts().map(|r| r.query.as_str()).collect();
        for result in &report.resolved {
            let marker = if conflicts.contains(&result.query.as_str()) {
                "  [CONFLICT]"
            } else {
                ""
            };
            println!("  {:<40} {}{}", result.query, summary(result), marker);
        }
    }

    if show_whois {
        let cache = WhoisCache::load(&config.whois_path())?;
        let addresses: Vec<IpAddr> = match Query::parse(query) {
            Query::Ip(ip) => vec![ip],
            Query::Domain(_) => report
                .resolved
                .iter()
                .filter_map(|r| r.query.parse().ok())
                .collect(),
        };
        let records: Vec<&WhoisRecord> = addresses
            .iter()
            .filter_map(|ip| cache.get(&ip.to_string()))
            .collect();
        if !records.is_empty() {
            println!();
            println!("=== Whois ===");
            for record in records {
                print_whois(record);
            }
        }
    }

    println!();
    Ok(())
}

/// Lines describing every match, highest precedence first.
pub fn describe(result: &ClassificationResult) -> Vec<String> {
    let mut lines = Vec::new();
    if result.matches.is_empty() {
        lines.push("[--] Not found in any list".to_string());
    }
    for (i, entry) in result.matches.iter().enumerate() {
        let tag = if i == 0 { "=>" } else { "  " };
        lines.push(format!(
            "{} [{}] {:<22} {} # {}",
            tag,
            entry.kind.rank(),
            entry.kind.name(),
            entry.pattern,
            entry.source_label
        ));
    }
    lines.push(String::new());
    lines.push(format!("Effective action: {}", result.effective_action));
    lines
}

fn summary(result: &ClassificationResult) -> String {
    match (&result.matched_kind, result.effective_action) {
        (Some(kind), action) => format!(
            "{} via {} ({})",
            action,
            kind.name(),
            result.matched_pattern.as_deref().unwrap_or_default()
        ),
        (None, Action::Unknown) => "UNKNOWN".to_string(),
        (None, action) => action.to_string(),
    }
}

pub(crate) fn print_whois(record: &WhoisRecord) {
    println!("  {}", record.ip);
    println!("    Org:      {}", record.org);
    println!("    Country:  {}", record.country);
    println!("    City:     {}", record.city);
    println!("    ASN:      {}", record.asn);
    if !record.hostname.is_empty() {
        println!("    Hostname: {}", record.hostname);
    }
    println!("    Cached:   {}", record.cached_at.format("%Y-%m-%d %H:%M:%S"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::{ListKind, PriorityList};

    fn engine() -> ClassificationEngine {
        let build = |kind, items: &[(&str, &str)]| {
            PriorityList::build(
                kind,
                items.iter().map(|(p, l)| (p.to_string(), l.to_string())),
            )
            .unwrap()
        };
        ClassificationEngine::new(vec![
            build(ListKind::WhitelistIpSpecific, &[("1.1.1.1", "Cloudflare")]),
            build(ListKind::BlacklistIpSegment, &[("1.1.1.0/24", "DROP")]),
        ])
    }

    #[test]
    fn test_describe_marks_winner() {
        let lines = describe(&engine().classify("1.1.1.1"));
        assert!(lines[0].starts_with("=> [1] whitelist-ip-specific"));
        assert!(lines[1].starts_with("   [3] blacklist-ip-segment"));
        assert_eq!(lines.last().unwrap(), "Effective action: ALLOWED");
    }

    #[test]
    fn test_describe_not_found() {
        let lines = describe(&engine().classify("9.9.9.9"));
        assert_eq!(lines[0], "[--] Not found in any list");
        assert_eq!(lines.last().unwrap(), "Effective action: UNKNOWN");
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            summary(&engine().classify("1.1.1.7")),
            "BLOCKED via blacklist-ip-segment (1.1.1.0/24)"
        );
        assert_eq!(summary(&engine().classify("9.9.9.9")), "UNKNOWN");
    }
}
