//! Whois ownership cache.
//!
//! Display-only metadata keyed by address. Nothing here takes part in
//! allow/block decisions.
//!
//! On disk one record per line:
//! `IP|ORG|COUNTRY|CITY|ASN|HOSTNAME|CACHED_DATE`

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::address::query_address;
use crate::error::{PangrosanError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FIELD_COUNT: usize = 7;

/// Ownership metadata for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhoisRecord {
    pub ip: IpAddr,
    pub org: String,
    pub country: String,
    pub city: String,
    pub asn: String,
    pub hostname: String,
    pub cached_at: NaiveDateTime,
}

impl WhoisRecord {
    /// Parse one pipe-delimited line. Extra trailing fields are ignored.
    pub fn parse_line(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < FIELD_COUNT {
            return Err(PangrosanError::Store(format!(
                "expected {} fields, found {}",
                FIELD_COUNT,
                parts.len()
            )));
        }

        let ip = query_address(parts[0])
            .ok_or_else(|| PangrosanError::Store(format!("invalid address '{}'", parts[0])))?;

        Ok(Self {
            ip,
            org: parts[1].trim().to_string(),
            country: parts[2].trim().to_string(),
            city: parts[3].trim().to_string(),
            asn: parts[4].trim().to_string(),
            hostname: parts[5].trim().to_string(),
            cached_at: parse_cached_at(parts[6])?,
        })
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.ip,
            clean(&self.org),
            clean(&self.country),
            clean(&self.city),
            clean(&self.asn),
            clean(&self.hostname),
            self.cached_at.format(DATE_FORMAT)
        )
    }

    fn matches(&self, term: &str) -> bool {
        if is_country_code(term) {
            return self.country.eq_ignore_ascii_case(term);
        }

        let lowered = term.to_lowercase();
        self.ip.to_string().starts_with(term)
            || self.org.to_lowercase().contains(&lowered)
            || (!self.asn.is_empty() && normalize_asn(&self.asn) == normalize_asn(term))
    }
}

/// Pipes and newlines would corrupt the line format
fn clean(field: &str) -> String {
    field.replace(['|', '\n', '\r'], " ")
}

fn parse_cached_at(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, DATE_FORMAT) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| PangrosanError::Store(format!("invalid cached date '{}'", raw)))
}

/// A two-letter term is a country code and only matches the country field
fn is_country_code(term: &str) -> bool {
    term.len() == 2 && term.chars().all(|c| c.is_ascii_alphabetic())
}

fn normalize_asn(asn: &str) -> String {
    let upper = asn.trim().to_uppercase();
    upper.strip_prefix("AS").unwrap_or(&upper).to_string()
}

/// Counts over the whole cache
#[derive(Debug, Clone, Default, Serialize)]
pub struct WhoisStats {
    pub total: usize,
    pub top_countries: Vec<(String, usize)>,
    pub top_orgs: Vec<(String, usize)>,
    pub top_asns: Vec<(String, usize)>,
}

const TOP_N: usize = 10;

fn top<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.filter(|v| !v.is_empty()) {
        *counts.entry(value).or_default() += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    // Count descending, then name for stable output
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(TOP_N);
    sorted
}

/// In-memory whois store, at most one record per address
#[derive(Debug, Clone, Default)]
pub struct WhoisCache {
    records: BTreeMap<IpAddr, WhoisRecord>,
}

impl WhoisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a cache file. A missing file is an empty cache; malformed lines
    /// are skipped with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cache = Self::new();
        if !path.exists() {
            info!("No whois cache at {}, starting fresh", path.display());
            return Ok(cache);
        }

        let content = std::fs::read_to_string(path)?;
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match WhoisRecord::parse_line(line) {
                Ok(record) => cache.upsert(record),
                Err(e) => warn!("{}:{}: skipping whois line: {}", path.display(), number + 1, e),
            }
        }

        info!("Loaded {} whois records from {}", cache.len(), path.display());
        Ok(cache)
    }

    /// Write the cache with a header; IPv4 before IPv6, numerically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        out.push_str("# Whois data cache\n");
        out.push_str(&format!(
            "# Last updated: {}\n",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out.push_str(&format!("# Total entries: {}\n", self.records.len()));
        out.push_str("# Format: IP|ORG|COUNTRY|CITY|ASN|HOSTNAME|CACHED_DATE\n");
        out.push_str("#\n");
        // BTreeMap<IpAddr> already orders V4 before V6
        for record in self.records.values() {
            out.push_str(&record.to_line());
            out.push('\n');
        }

        crate::store::write_atomic(path, out.as_bytes())?;
        info!("Saved {} whois records to {}", self.records.len(), path.display());
        Ok(())
    }

    /// Look up an address; a `/prefix` suffix is ignored.
    pub fn get(&self, ip: &str) -> Option<&WhoisRecord> {
        let addr = query_address(ip)?;
        self.records.get(&addr)
    }

    /// Insert or replace the record for `record.ip`.
    pub fn upsert(&mut self, record: WhoisRecord) {
        debug!("whois upsert {}", record.ip);
        self.records.insert(record.ip, record);
    }

    /// Records matching `term`.
    ///
    /// A two-letter term is taken as a country code (exact, case-insensitive).
    /// Anything else matches an address prefix, an org substring
    /// (case-insensitive) or an exact ASN with or without the `AS` prefix.
    pub fn search(&self, term: &str) -> Vec<&WhoisRecord> {
        let term = term.trim();
        if term.is_empty() {
            return Vec::new();
        }
        self.records.values().filter(|r| r.matches(term)).collect()
    }

    pub fn stats(&self) -> WhoisStats {
        let records = || self.records.values();
        WhoisStats {
            total: self.records.len(),
            top_countries: top(records().map(|r| r.country.as_str())),
            top_orgs: top(records().map(|r| r.org.as_str())),
            top_asns: top(records().map(|r| r.asn.as_str())),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ip: &str, org: &str, country: &str, asn: &str) -> WhoisRecord {
        WhoisRecord {
            ip: ip.parse().unwrap(),
            org: org.to_string(),
            country: country.to_string(),
            city: "Somewhere".to_string(),
            asn: asn.to_string(),
            hostname: String::new(),
            cached_at: parse_cached_at("2024-01-15 10:30:00").unwrap(),
        }
    }

    fn cache() -> WhoisCache {
        let mut cache = WhoisCache::new();
        cache.upsert(record("8.8.8.8", "Google LLC", "US", "AS15169"));
        cache.upsert(record("1.1.1.1", "Cloudflare, Inc.", "AU", "AS13335"));
        cache.upsert(record("185.60.216.35", "Meta Platforms (USA)", "IE", "AS32934"));
        cache.upsert(record("2001:4860:4860::8888", "Google LLC", "US", "AS15169"));
        cache
    }

    #[test]
    fn test_search_org_substring() {
        let cache = cache();
        let hits = cache.search("google");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|r| r.org == "Google LLC"));
        assert_eq!(cache.search("Google").len(), 2);
    }

    #[test]
    fn test_search_country_is_exact() {
        let cache = cache();
        // "USA" in Meta's org must not match a country search
        let hits = cache.search("US");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|r| r.country == "US"));
        assert_eq!(cache.search("us").len(), 2);
    }

    #[test]
    fn test_search_asn_and_ip() {
        let cache = cache();
        assert_eq!(cache.search("AS13335").len(), 1);
        assert_eq!(cache.search("13335").len(), 1);
        assert_eq!(cache.search("185.60.").len(), 1);
        assert!(cache.search("").is_empty());
        assert!(cache.search("nothing-like-this").is_empty());
    }

    #[test]
    fn test_get_strips_prefix() {
        let cache = cache();
        assert_eq!(cache.get("8.8.8.8/32").unwrap().asn, "AS15169");
        assert!(cache.get("8.8.4.4").is_none());
        assert!(cache.get("not-an-ip").is_none());
    }

    #[test]
    fn test_upsert_overwrites() {
        let mut cache = cache();
        cache.upsert(record("8.8.8.8", "Renamed", "US", "AS1"));
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.get("8.8.8.8").unwrap().org, "Renamed");
    }

    #[test]
    fn test_parse_line_rejects_short() {
        assert!(WhoisRecord::parse_line("8.8.8.8|Google|US").is_err());
        assert!(WhoisRecord::parse_line("bad|a|b|c|d|e|2024-01-01").is_err());
        let r = WhoisRecord::parse_line("8.8.8.8/32|Google LLC|US|Mountain View|AS15169|dns.google|2024-01-15")
            .unwrap();
        assert_eq!(r.ip, "8.8.8.8".parse::<IpAddr>().unwrap());
        assert_eq!(r.hostname, "dns.google");
    }

    #[test]
    fn test_save_load_orders_v4_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whois.txt");
        cache().save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let ips: Vec<&str> = content
            .lines()
            .filter(|l| !l.starts_with('#'))
            .map(|l| l.split('|').next().unwrap())
            .collect();
        assert_eq!(
            ips,
            vec!["1.1.1.1", "8.8.8.8", "185.60.216.35", "2001:4860:4860::8888"]
        );

        let loaded = WhoisCache::load(&path).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.get("1.1.1.1"), cache().get("1.1.1.1"));
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whois.txt");
        std::fs::write(
            &path,
            "# header\n8.8.8.8|Google LLC|US|MV|AS15169|dns.google|2024-01-15 10:30:00\ntruncated|line\n",
        )
        .unwrap();
        let loaded = WhoisCache::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);

        let missing = WhoisCache::load(&dir.path().join("absent.txt")).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_stats_top_counts() {
        let stats = cache().stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.top_countries[0], ("US".to_string(), 2));
        assert_eq!(stats.top_orgs[0], ("Google LLC".to_string(), 2));
        assert_eq!(stats.top_asns[0], ("AS15169".to_string(), 2));
    }
}
