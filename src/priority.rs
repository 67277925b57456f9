//! Priority lists: the six rule categories and their matching logic.
//!
//! Every list kind carries a fixed rank (1 = highest precedence). Rank is a
//! property of the kind, never of an individual entry.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use crate::address::{self, contains, is_single_host};
use crate::error::{PangrosanError, Result};

/// The six list categories, declared in rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListKind {
    WhitelistIpSpecific,
    BlacklistIpSpecific,
    BlacklistIpSegment,
    WhitelistIpSegment,
    WhitelistDomain,
    BlacklistDomain,
}

/// Effective decision for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allowed,
    Blocked,
    Unknown,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allowed => "ALLOWED",
            Self::Blocked => "BLOCKED",
            Self::Unknown => "UNKNOWN",
        })
    }
}

impl ListKind {
    /// All kinds, highest precedence first
    pub const ALL: [ListKind; 6] = [
        Self::WhitelistIpSpecific,
        Self::BlacklistIpSpecific,
        Self::BlacklistIpSegment,
        Self::WhitelistIpSegment,
        Self::WhitelistDomain,
        Self::BlacklistDomain,
    ];

    pub fn rank(self) -> u8 {
        match self {
            Self::WhitelistIpSpecific => 1,
            Self::BlacklistIpSpecific => 2,
            Self::BlacklistIpSegment => 3,
            Self::WhitelistIpSegment => 4,
            Self::WhitelistDomain => 5,
            Self::BlacklistDomain => 6,
        }
    }

    /// Action taken when a query matches this list
    pub fn action(self) -> Action {
        match self {
            Self::WhitelistIpSpecific | Self::WhitelistIpSegment | Self::WhitelistDomain => {
                Action::Allowed
            }
            Self::BlacklistIpSpecific | Self::BlacklistIpSegment | Self::BlacklistDomain => {
                Action::Blocked
            }
        }
    }

    pub fn is_domain_list(self) -> bool {
        matches!(self, Self::WhitelistDomain | Self::BlacklistDomain)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::WhitelistIpSpecific => "whitelist-ip-specific",
            Self::BlacklistIpSpecific => "blacklist-ip-specific",
            Self::BlacklistIpSegment => "blacklist-ip-segment",
            Self::WhitelistIpSegment => "whitelist-ip-segment",
            Self::WhitelistDomain => "whitelist-domain",
            Self::BlacklistDomain => "blacklist-domain",
        }
    }

    /// Human-readable title used in file headers and lookup output
    pub fn title(self) -> &'static str {
        match self {
            Self::WhitelistIpSpecific => "Whitelist IP Specific",
            Self::BlacklistIpSpecific => "Blacklist IP Specific",
            Self::BlacklistIpSegment => "Blacklist IP Segment",
            Self::WhitelistIpSegment => "Whitelist IP Segment",
            Self::WhitelistDomain => "Whitelist Domain",
            Self::BlacklistDomain => "Blacklist Domain",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One classification rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub pattern: String,
    pub source_label: String,
    pub kind: ListKind,
}

/// Compiled form of a pattern
#[derive(Debug, Clone)]
enum Pattern {
    Net(IpNet),
    /// Matches the domain itself and any subdomain
    Domain,
    /// `*.suffix`: matches strict subdomains only
    Wildcard,
}

/// Left-fold a sequence of `(pattern, label)` batches into one deduplicated
/// batch. A later label for a duplicate pattern overwrites the earlier one;
/// the position of the first occurrence is kept.
pub fn merge_batches<I, B>(batches: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = B>,
    B: IntoIterator<Item = (String, String)>,
{
    let mut merged: Vec<(String, String)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for batch in batches {
        for (pattern, label) in batch {
            match index.get(&pattern) {
                Some(&i) => merged[i].1 = label,
                None => {
                    index.insert(pattern.clone(), merged.len());
                    merged.push((pattern, label));
                }
            }
        }
    }

    merged
}

/// An immutable set of rules of one kind
#[derive(Debug, Clone)]
pub struct PriorityList {
    kind: ListKind,
    entries: Vec<Entry>,
    nets: Vec<(IpNet, usize)>,
    domains: HashMap<String, usize>,
    wildcards: HashMap<String, usize>,
}

impl PriorityList {
    /// An empty list of the given kind
    pub fn empty(kind: ListKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            nets: Vec::new(),
            domains: HashMap::new(),
            wildcards: HashMap::new(),
        }
    }

    /// Build a list from `(pattern, label)` pairs.
    ///
    /// Patterns are validated eagerly; the first malformed pattern fails the
    /// whole list with a configuration error. Duplicates (after
    /// normalization) keep the last label.
    pub fn build<I>(kind: ListKind, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut normalized = Vec::new();
        for (raw, label) in pairs {
            let (pattern, _) = compile(kind, &raw)?;
            normalized.push((pattern, label));
        }

        let mut list = Self::empty(kind);
        for (pattern, label) in merge_batches([normalized]) {
            let (pattern, compiled) = compile(kind, &pattern)?;
            let idx = list.entries.len();
            match compiled {
                Pattern::Net(net) => list.nets.push((net, idx)),
                Pattern::Domain => {
                    list.domains.insert(pattern.clone(), idx);
                }
                Pattern::Wildcard => {
                    let suffix = pattern.trim_start_matches("*.").to_string();
                    list.wildcards.insert(suffix, idx);
                }
            }
            list.entries.push(Entry {
                pattern,
                source_label: label,
                kind,
            });
        }

        Ok(list)
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Match an IP query. When several ranges match, the narrowest wins.
    pub fn match_ip(&self, ip: &IpAddr) -> Option<&Entry> {
        self.nets
            .iter()
            .filter(|(net, _)| contains(net, ip))
            .max_by_key(|(net, _)| net.prefix_len())
            .map(|(_, idx)| &self.entries[*idx])
    }

    /// Match a domain query. The longest matching suffix wins.
    ///
    /// A plain pattern matches itself and any subdomain at a label boundary.
    /// A wildcard `*.suffix` matches strict subdomains of `suffix` only.
    pub fn match_domain(&self, domain: &str) -> Option<&Entry> {
        if self.domains.is_empty() && self.wildcards.is_empty() {
            return None;
        }

        let query = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if query.is_empty() {
            return None;
        }

        let mut candidate: &str = &query;
        let mut is_self = true;
        loop {
            if let Some(idx) = self.domains.get(candidate) {
                return Some(&self.entries[*idx]);
            }
            if !is_self {
                if let Some(idx) = self.wildcards.get(candidate) {
                    return Some(&self.entries[*idx]);
                }
            }
            match candidate.split_once('.') {
                Some((_, rest)) if !rest.is_empty() => {
                    candidate = rest;
                    is_self = false;
                }
                _ => return None,
            }
        }
    }

    /// Match either kind of query; IP queries never match domain lists and
    /// vice versa.
    pub fn find(&self, query: &Query) -> Option<&Entry> {
        match query {
            Query::Ip(ip) if !self.kind.is_domain_list() => self.match_ip(ip),
            Query::Domain(d) if self.kind.is_domain_list() => self.match_domain(d),
            _ => None,
        }
    }
}

/// A classified query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Ip(IpAddr),
    Domain(String),
}

impl Query {
    /// Syntactic detection: an IP literal is an IP query, anything else a
    /// domain query.
    pub fn parse(raw: &str) -> Self {
        match address::query_address(raw) {
            Some(ip) => Self::Ip(ip),
            None => Self::Domain(raw.trim().trim_end_matches('.').to_ascii_lowercase()),
        }
    }
}

/// Canonical text for an IP pattern, so `1.2.3.4`, `1.2.3.4/32` and
/// differently cased IPv6 spellings deduplicate to one entry.
fn canonical_net(net: &IpNet) -> String {
    if is_single_host(net) {
        net.addr().to_string()
    } else {
        net.to_string()
    }
}

fn compile(kind: ListKind, raw: &str) -> Result<(String, Pattern)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PangrosanError::Configuration(format!(
            "Empty pattern in {}",
            kind
        )));
    }

    let config_err = |e: PangrosanError| {
        PangrosanError::Configuration(format!("{} in {}", e, kind))
    };

    match kind {
        ListKind::WhitelistIpSpecific | ListKind::BlacklistIpSpecific => {
            let net = address::parse_ip_or_cidr(raw).map_err(config_err)?;
            if !is_single_host(&net) {
                return Err(PangrosanError::Configuration(format!(
                    "{} requires a single address, got {}",
                    kind, raw
                )));
            }
            Ok((canonical_net(&net), Pattern::Net(net)))
        }
        ListKind::BlacklistIpSegment | ListKind::WhitelistIpSegment => {
            let net = address::parse_ip_or_cidr(raw).map_err(config_err)?;
            Ok((canonical_net(&net), Pattern::Net(net)))
        }
        ListKind::WhitelistDomain | ListKind::BlacklistDomain => {
            let domain = address::normalize_domain(raw).map_err(config_err)?;
            let pattern = if domain.starts_with("*.") {
                Pattern::Wildcard
            } else {
                Pattern::Domain
            };
            Ok((domain, pattern))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(p, l)| (p.to_string(), l.to_string()))
            .collect()
    }

    #[test]
    fn test_ranks_are_unique_and_ordered() {
        let ranks: Vec<u8> = ListKind::ALL.iter().map(|k| k.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_actions() {
        assert_eq!(ListKind::WhitelistIpSpecific.action(), Action::Allowed);
        assert_eq!(ListKind::BlacklistIpSegment.action(), Action::Blocked);
        assert_eq!(ListKind::WhitelistDomain.action(), Action::Allowed);
        assert_eq!(ListKind::BlacklistDomain.action(), Action::Blocked);
    }

    #[test]
    fn test_merge_batches_last_label_wins() {
        let merged = merge_batches(vec![
            pairs(&[("a.com", "Feed A"), ("b.com", "Feed A")]),
            pairs(&[("a.com", "Feed B"), ("c.com", "Feed B")]),
        ]);
        assert_eq!(
            merged,
            pairs(&[("a.com", "Feed B"), ("b.com", "Feed A"), ("c.com", "Feed B")])
        );
    }

    #[test]
    fn test_merge_batches_within_one_batch() {
        let merged = merge_batches(vec![pairs(&[("x", "1"), ("x", "2"), ("x", "3")])]);
        assert_eq!(merged, pairs(&[("x", "3")]));
    }

    #[test]
    fn test_build_dedup_after_normalization() {
        let list = PriorityList::build(
            ListKind::BlacklistDomain,
            pairs(&[("Evil.com", "first"), ("evil.com.", "second")]),
        )
        .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.entries()[0].source_label, "second");
    }

    #[test]
    fn test_build_dedup_ip_spellings() {
        let list = PriorityList::build(
            ListKind::WhitelistIpSpecific,
            pairs(&[
                ("1.2.3.4", "first"),
                ("1.2.3.4/32", "second"),
                ("2001:DB8::1", "first v6"),
                ("2001:db8::1", "second v6"),
            ]),
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[0].pattern, "1.2.3.4");
        assert_eq!(list.entries()[0].source_label, "second");
        assert_eq!(list.entries()[1].pattern, "2001:db8::1");
        assert_eq!(list.entries()[1].source_label, "second v6");

        let segments = PriorityList::build(
            ListKind::BlacklistIpSegment,
            pairs(&[("2001:DB8::/32", "a"), ("2001:db8:0::/32", "b"), ("9.9.9.9/32", "c")]),
        )
        .unwrap();
        let patterns: Vec<&str> = segments.entries().iter().map(|e| e.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["2001:db8::/32", "9.9.9.9"]);
        assert_eq!(segments.entries()[0].source_label, "b");
    }

    #[test]
    fn test_build_rejects_empty_pattern() {
        let err = PriorityList::build(ListKind::BlacklistDomain, pairs(&[("  ", "x")])).unwrap_err();
        assert!(matches!(err, PangrosanError::Configuration(_)));
    }

    #[test]
    fn test_build_rejects_bad_prefix() {
        let err =
            PriorityList::build(ListKind::BlacklistIpSegment, pairs(&[("10.0.0.0/40", "x")]))
                .unwrap_err();
        assert!(matches!(err, PangrosanError::Configuration(_)));
    }

    #[test]
    fn test_build_specific_rejects_range() {
        let err =
            PriorityList::build(ListKind::WhitelistIpSpecific, pairs(&[("1.1.1.0/24", "x")]))
                .unwrap_err();
        assert!(err.to_string().contains("single address"));

        assert!(
            PriorityList::build(ListKind::WhitelistIpSpecific, pairs(&[("1.1.1.1/32", "x")]))
                .is_ok()
        );
    }

    #[test]
    fn test_wildcard_matching() {
        let list =
            PriorityList::build(ListKind::WhitelistDomain, pairs(&[("*.github.com", "GitHub")]))
                .unwrap();
        assert!(list.match_domain("api.github.com").is_some());
        assert!(list.match_domain("a.b.github.com").is_some());
        assert!(list.match_domain("github.com").is_none());
        assert!(list.match_domain("notgithub.com").is_none());
    }

    #[test]
    fn test_plain_domain_matches_subdomains() {
        let list =
            PriorityList::build(ListKind::BlacklistDomain, pairs(&[("evil.com", "URLhaus")]))
                .unwrap();
        assert!(list.match_domain("evil.com").is_some());
        assert!(list.match_domain("EVIL.com.").is_some());
        assert!(list.match_domain("cdn.evil.com").is_some());
        assert!(list.match_domain("notevil.com").is_none());
        assert!(list.match_domain("evil.com.au").is_none());
    }

    #[test]
    fn test_longest_domain_suffix_wins() {
        let list = PriorityList::build(
            ListKind::BlacklistDomain,
            pairs(&[("example.com", "broad"), ("ads.example.com", "narrow")]),
        )
        .unwrap();
        assert_eq!(
            list.match_domain("x.ads.example.com").unwrap().source_label,
            "narrow"
        );
        assert_eq!(list.match_domain("www.example.com").unwrap().source_label, "broad");
    }

    #[test]
    fn test_ip_matching_narrowest_wins() {
        let list = PriorityList::build(
            ListKind::BlacklistIpSegment,
            pairs(&[("10.0.0.0/8", "wide"), ("10.1.0.0/16", "narrow"), ("2001:db8::/32", "v6")]),
        )
        .unwrap();
        let ip: IpAddr = "10.1.2.3".parse().unwrap();
        assert_eq!(list.match_ip(&ip).unwrap().source_label, "narrow");
        let ip: IpAddr = "10.200.0.1".parse().unwrap();
        assert_eq!(list.match_ip(&ip).unwrap().source_label, "wide");
        let ip: IpAddr = "2001:db8::5".parse().unwrap();
        assert_eq!(list.match_ip(&ip).unwrap().source_label, "v6");
        let ip: IpAddr = "11.0.0.1".parse().unwrap();
        assert!(list.match_ip(&ip).is_none());
    }

    #[test]
    fn test_find_respects_query_type() {
        let ip_list =
            PriorityList::build(ListKind::BlacklistIpSpecific, pairs(&[("1.2.3.4", "x")])).unwrap();
        let dom_list =
            PriorityList::build(ListKind::BlacklistDomain, pairs(&[("example.com", "x")])).unwrap();

        let ip_query = Query::parse("1.2.3.4");
        let dom_query = Query::parse("Example.com");

        assert!(ip_list.find(&ip_query).is_some());
        assert!(ip_list.find(&dom_query).is_none());
        assert!(dom_list.find(&dom_query).is_some());
        assert!(dom_list.find(&ip_query).is_none());
    }

    #[test]
    fn test_query_parse() {
        assert_eq!(Query::parse("8.8.8.8"), Query::Ip("8.8.8.8".parse().unwrap()));
        assert_eq!(Query::parse("WWW.Example.com."), Query::Domain("www.example.com".into()));
        assert_eq!(
            Query::parse("1.2.3.4/garbage"),
            Query::Domain("1.2.3.4/garbage".into())
        );
        assert_eq!(Query::parse("10.0.0.0/8"), Query::Ip("10.0.0.0".parse().unwrap()));
    }
}
