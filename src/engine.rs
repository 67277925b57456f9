//! Priority classification engine.
//!
//! Holds one [`PriorityList`] per [`ListKind`] and answers point queries by
//! evaluating all six and keeping the match with the lowest rank. The
//! engine never mutates its lists, so a loaded snapshot can be shared by
//! any number of concurrent callers.

use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use tracing::{error, warn};

use crate::config::Config;
use crate::priority::{Action, Entry, ListKind, PriorityList, Query};
use crate::resolver::{ConcurrentResolver, NameResolver};

/// Outcome of classifying one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub query: String,
    pub matched_kind: Option<ListKind>,
    pub rank: Option<u8>,
    pub effective_action: Action,
    pub matched_pattern: Option<String>,
    pub source_label: Option<String>,
    /// Every list that matched, in rank order (the first one decides)
    pub matches: Vec<Entry>,
}

impl ClassificationResult {
    fn from_matches(query: &str, matches: Vec<Entry>) -> Self {
        match matches.first() {
            Some(winner) => Self {
                query: query.to_string(),
                matched_kind: Some(winner.kind),
                rank: Some(winner.kind.rank()),
                effective_action: winner.kind.action(),
                matched_pattern: Some(winner.pattern.clone()),
                source_label: Some(winner.source_label.clone()),
                matches,
            },
            None => Self {
                query: query.to_string(),
                matched_kind: None,
                rank: None,
                effective_action: Action::Unknown,
                matched_pattern: None,
                source_label: None,
                matches,
            },
        }
    }
}

/// Classification of a domain plus each address it resolves to
#[derive(Debug, Clone, Serialize)]
pub struct DomainReport {
    pub domain: ClassificationResult,
    /// Per-address results; empty when the domain did not resolve
    pub resolved: Vec<ClassificationResult>,
}

impl DomainReport {
    /// Resolved addresses whose own action contradicts the domain's.
    pub fn conflicts(&self) -> impl Iterator<Item = &ClassificationResult> {
        let domain_action = self.domain.effective_action;
        self.resolved.iter().filter(move |r| {
            r.effective_action != Action::Unknown
                && domain_action != Action::Unknown
                && r.effective_action != domain_action
        })
    }
}

/// The six lists and the query logic over them
#[derive(Debug, Clone)]
pub struct ClassificationEngine {
    lists: BTreeMap<ListKind, PriorityList>,
}

impl Default for ClassificationEngine {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ClassificationEngine {
    /// Build an engine from lists; missing kinds are empty. A later list of
    /// the same kind replaces an earlier one.
    pub fn new(lists: impl IntoIterator<Item = PriorityList>) -> Self {
        let mut map: BTreeMap<ListKind, PriorityList> = ListKind::ALL
            .iter()
            .map(|kind| (*kind, PriorityList::empty(*kind)))
            .collect();
        for list in lists {
            map.insert(list.kind(), list);
        }
        Self { lists: map }
    }

    /// Load every list named by `config`.
    ///
    /// A list that fails to load is logged and left empty; the other lists
    /// are unaffected.
    pub fn load(config: &Config) -> Self {
        let lists = ListKind::ALL.iter().filter_map(|kind| {
            let path = config.list_path(*kind);
            load_or_report(&path, *kind)
        });
        Self::new(lists.collect::<Vec<_>>())
    }

    pub fn list(&self, kind: ListKind) -> &PriorityList {
        // Every kind is inserted at construction
        &self.lists[&kind]
    }

    /// Classify an IP literal or domain. Never fails: no match is `Unknown`.
    pub fn classify(&self, query: &str) -> ClassificationResult {
        let parsed = Query::parse(query);
        let matches: Vec<Entry> = self
            .lists
            .values()
            .filter_map(|list| list.find(&parsed))
            .cloned()
            .collect();
        // BTreeMap iteration follows ListKind order, which is rank order
        ClassificationResult::from_matches(query.trim(), matches)
    }

    pub fn classify_ip(&self, ip: &IpAddr) -> ClassificationResult {
        self.classify(&ip.to_string())
    }

    /// Classify a domain and every address it resolves to.
    ///
    /// The domain-level action stands on its own; per-address results are
    /// informational. IP queries yield a report with no resolved addresses.
    pub async fn classify_with_resolution<R: NameResolver>(
        &self,
        query: &str,
        resolver: &ConcurrentResolver<R>,
    ) -> DomainReport {
        let domain = self.classify(query);

        let resolved = match Query::parse(query) {
            Query::Ip(_) => Vec::new(),
            Query::Domain(name) => {
                let batch = resolver.resolve_all(&[name.clone()], 1).await;
                batch
                    .ips(&name)
                    .iter()
                    .map(|ip| self.classify_ip(ip))
                    .collect()
            }
        };

        DomainReport { domain, resolved }
    }
}

fn load_or_report(path: &Path, kind: ListKind) -> Option<PriorityList> {
    match crate::store::load_list(path, kind) {
        Ok(list) => Some(list),
        Err(e) => {
            if matches!(e, crate::error::PangrosanError::Configuration(_)) {
                warn!("Skipping {} ({}): {}", kind, path.display(), e);
            } else {
                error!("Failed to load {} ({}): {}", kind, path.display(), e);
            }
            None
        }
    }
}
