//! Plain-text list files.
//!
//! One entry per line in the form `pattern # source label`. Blank lines and
//! lines starting with `#` are ignored; a line without a label gets
//! [`UNKNOWN_SOURCE`]. Writes go through a temporary file and an atomic
//! rename so readers never observe a half-written list.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::address::{parse_ip_or_cidr, query_address};
use crate::error::Result;
use crate::priority::{ListKind, PriorityList};

/// Label used when a line carries no source
pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// Separator between pattern and source label
const LABEL_SEPARATOR: &str = " # ";

/// Parse one list line.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    match line.split_once(LABEL_SEPARATOR) {
        Some((pattern, label)) => {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                return None;
            }
            Some((pattern.to_string(), label.trim().to_string()))
        }
        None => Some((line.to_string(), UNKNOWN_SOURCE.to_string())),
    }
}

/// Parse a whole list file's content.
pub fn parse_batch(content: &str) -> Vec<(String, String)> {
    content.lines().filter_map(parse_line).collect()
}

/// Read a list file; a missing file is an empty batch.
pub fn load_batch(path: &Path) -> Result<Vec<(String, String)>> {
    if !path.exists() {
        debug!("{} not found, treating as empty", path.display());
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let batch = parse_batch(&content);
    info!("Loaded {} entries from {}", batch.len(), path.display());
    Ok(batch)
}

/// Read and compile a list file.
pub fn load_list(path: &Path, kind: ListKind) -> Result<PriorityList> {
    PriorityList::build(kind, load_batch(path)?)
}

/// Write `contents` to `path` atomically (temp file in the same directory,
/// fsync, rename).
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(contents)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Sort key placing IP patterns numerically (IPv4 before IPv6) and
/// everything else lexicographically after them.
fn sort_key(pattern: &str) -> (u8, u128, u8, String) {
    match parse_ip_or_cidr(pattern) {
        Ok(net) => match net.addr() {
            IpAddr::V4(v4) => (4, u128::from(u32::from(v4)), net.prefix_len(), String::new()),
            IpAddr::V6(v6) => (6, u128::from(v6), net.prefix_len(), String::new()),
        },
        Err(_) => (9, 0, 0, pattern.to_string()),
    }
}

/// Write a list file with a descriptive header, entries sorted.
pub fn write_entries(path: &Path, kind: ListKind, entries: &BTreeMap<String, String>) -> Result<()> {
    let mut sorted: Vec<(&String, &String)> = entries.iter().collect();
    sorted.sort_by_cached_key(|(pattern, _)| sort_key(pattern));

    let mut out = String::new();
    out.push_str(&format!("# {}\n", kind.title()));
    out.push_str(&format!(
        "# Last updated: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("# Total entries: {}\n", sorted.len()));
    out.push_str("# Format: <pattern> # <source>\n");
    out.push_str(&format!("# Priority: level {}\n", kind.rank()));
    out.push_str("#\n");
    for (pattern, label) in sorted {
        out.push_str(pattern);
        out.push_str(LABEL_SEPARATOR);
        out.push_str(label);
        out.push('\n');
    }

    write_atomic(path, out.as_bytes())?;
    info!("Wrote {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Write the non-wildcard domains of `list` as a hosts file
/// (`0.0.0.0 domain`, sorted). Returns the number of domains written.
pub fn write_hosts(path: &Path, list: &PriorityList) -> Result<usize> {
    let mut domains: Vec<&str> = list
        .entries()
        .iter()
        .map(|e| e.pattern.as_str())
        .filter(|p| !p.starts_with('*'))
        .collect();
    domains.sort_unstable();
    domains.dedup();

    let mut out = String::new();
    out.push_str("# Hosts file format for domain blacklist\n");
    out.push_str(&format!(
        "# Generated: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("# Total entries: {}\n", domains.len()));
    out.push_str("# Format: 0.0.0.0 domain.tld\n");
    out.push_str("#\n");
    for domain in &domains {
        out.push_str("0.0.0.0 ");
        out.push_str(domain);
        out.push('\n');
    }

    write_atomic(path, out.as_bytes())?;
    info!("Wrote {} hosts entries to {}", domains.len(), path.display());
    Ok(domains.len())
}

/// Result of merging a resolution run into an existing IP-specific list
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub entries: BTreeMap<String, String>,
    pub added: usize,
    pub updated: usize,
    pub removed_stale: usize,
    pub removed_whitelisted: usize,
}

/// Merge freshly resolved entries into an existing IP-specific batch
/// (blacklist-ip-specific, or whitelist-ip-specific with an empty `whitelist`).
///
/// - anything matching `whitelist` is dropped or never added, whitelist wins
/// - entries labelled with `label_prefix` that the new run did not produce
///   are dropped as stale; entries without the prefix (manual) are kept
/// - resolved entries are added, or replace the label of an existing one
pub fn reconcile_resolved(
    existing: Vec<(String, String)>,
    resolved: &BTreeMap<IpAddr, String>,
    whitelist: &PriorityList,
    label_prefix: &str,
) -> Reconciled {
    let mut result = Reconciled::default();
    let whitelisted = |pattern: &str| {
        query_address(pattern).is_some_and(|ip| whitelist.match_ip(&ip).is_some())
    };
    let resolved_keys: HashMap<String, &String> = resolved
        .iter()
        .map(|(ip, label)| (ip.to_string(), label))
        .collect();

    for (pattern, label) in existing {
        let key = canonical_key(&pattern);
        if whitelisted(&key) {
            result.removed_whitelisted += 1;
            debug!("Removing whitelisted IP {} ({})", pattern, label);
            continue;
        }
        if label.starts_with(label_prefix) && !resolved_keys.contains_key(&key) {
            result.removed_stale += 1;
            debug!("Removing outdated IP {} ({})", pattern, label);
            continue;
        }
        result.entries.insert(key, label);
    }

    for (key, label) in resolved_keys {
        if whitelisted(&key) {
            result.removed_whitelisted += 1;
            continue;
        }
        match result.entries.get(&key) {
            Some(current) if current == label => {}
            Some(_) => {
                result.updated += 1;
                result.entries.insert(key, label.clone());
            }
            None => {
                result.added += 1;
                result.entries.insert(key, label.clone());
            }
        }
    }

    info!(
        "Reconciled: {} added, {} updated, {} stale removed, {} whitelisted removed",
        result.added, result.updated, result.removed_stale, result.removed_whitelisted
    );

    result
}

/// Single addresses are keyed by their canonical text (`1.2.3.4/32` and
/// `1.2.3.4` are the same entry).
fn canonical_key(pattern: &str) -> String {
    match parse_ip_or_cidr(pattern) {
        Ok(net) if crate::address::is_single_host(&net) => net.addr().to_string(),
        _ => pattern.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(
            parse_line("evil.com # URLhaus"),
            Some(("evil.com".to_string(), "URLhaus".to_string()))
        );
        assert_eq!(
            parse_line("  1.2.3.4  "),
            Some(("1.2.3.4".to_string(), UNKNOWN_SOURCE.to_string()))
        );
        assert_eq!(parse_line("# comment"), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line(" # only label"), None);
    }

    #[test]
    fn test_parse_batch_label_with_hash() {
        let batch = parse_batch("a.com # Feed # extra\n\n# header\nb.com\n");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].1, "Feed # extra");
        assert_eq!(batch[1].1, UNKNOWN_SOURCE);
    }

    #[test]
    fn test_load_batch_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let batch = load_batch(&dir.path().join("absent.txt")).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_write_then_load_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drop.txt");
        let mut entries = BTreeMap::new();
        entries.insert("10.0.0.0/8".to_string(), "Spamhaus DROP".to_string());
        entries.insert("2.0.0.0/16".to_string(), "Spamhaus DROP".to_string());
        entries.insert("2001:db8::/32".to_string(), "v6 feed".to_string());

        write_entries(&path, ListKind::BlacklistIpSegment, &entries).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Blacklist IP Segment"));
        let patterns: Vec<String> = parse_batch(&content).into_iter().map(|(p, _)| p).collect();
        assert_eq!(patterns, vec!["2.0.0.0/16", "10.0.0.0/8", "2001:db8::/32"]);

        let list = load_list(&path, ListKind::BlacklistIpSegment).unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.match_ip(&ip("10.9.9.9")).is_some());
    }

    #[test]
    fn test_write_hosts_skips_wildcards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.txt");
        let list = PriorityList::build(
            ListKind::BlacklistDomain,
            [
                ("zz.example", "Feed"),
                ("*.ads.example", "Feed"),
                ("Malware.example", "Feed"),
            ]
            .into_iter()
            .map(|(p, l)| (p.to_string(), l.to_string())),
        )
        .unwrap();

        assert_eq!(write_hosts(&path, &list).unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Hosts file format"));
        assert!(content.contains("# Total entries: 2\n"));
        let body: Vec<&str> = content.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(body, vec!["0.0.0.0 malware.example", "0.0.0.0 zz.example"]);
    }

    #[test]
    fn test_reconcile_resolved() {
        let existing = vec![
            ("9.9.9.1".to_string(), "Manual block".to_string()),
            ("9.9.9.2".to_string(), "resolved from old.example (URLhaus)".to_string()),
            ("9.9.9.3/32".to_string(), "resolved from bad.example (URLhaus)".to_string()),
            ("9.9.9.4".to_string(), "Manual whitelisted later".to_string()),
        ];
        let mut resolved = BTreeMap::new();
        resolved.insert(ip("9.9.9.3"), "resolved from bad.example (Feed B)".to_string());
        resolved.insert(ip("9.9.9.5"), "resolved from new.example (URLhaus)".to_string());

        let whitelist = PriorityList::build(
            ListKind::WhitelistIpSpecific,
            vec![("9.9.9.4".to_string(), "Infra".to_string())],
        )
        .unwrap();

        let r = reconcile_resolved(existing, &resolved, &whitelist, "resolved from");

        assert_eq!(r.removed_stale, 1);
        assert_eq!(r.updated, 1);
        assert_eq!(r.added, 1);
        assert_eq!(r.removed_whitelisted, 1);
        assert_eq!(r.entries.len(), 3);
        assert_eq!(r.entries["9.9.9.1"], "Manual block");
        assert_eq!(r.entries["9.9.9.3"], "resolved from bad.example (Feed B)");
        assert!(r.entries.contains_key("9.9.9.5"));
        assert!(!r.entries.contains_key("9.9.9.2"));
        assert!(!r.entries.contains_key("9.9.9.4"));
    }
}
