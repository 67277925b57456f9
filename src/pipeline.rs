//! Blacklist domain to IP resolution with triple protection.
//!
//! A run moves through `Init -> SeedWhitelist -> ResolveBlacklist -> Done`:
//! whitelist domains are resolved first to build the shared-IP protection
//! set, then every blacklist domain is resolved and each answer is pushed
//! through the [`ProtectionFilter`]. Survivors become new
//! blacklist-ip-specific entries.
//!
//! [`ResolutionPipeline::run_whitelist`] is the unprotected counterpart:
//! whitelist domains become whitelist-ip-specific entries as-is.

use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::priority::{Entry, ListKind, PriorityList};
use crate::protection::{ProtectionFilter, ProtectionStats, ProtectionTables};
use crate::resolver::{ConcurrentResolver, NameResolver};

/// Run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    SeedWhitelist,
    ResolveBlacklist,
    ResolveWhitelist,
    Done,
}

/// Everything a run produces
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Surviving address -> source label
    pub survivors: BTreeMap<IpAddr, String>,
    pub stats: ProtectionStats,
    pub whitelist_domains: usize,
    pub shared_ips: usize,
    pub blacklist_domains: usize,
    pub wildcards_skipped: usize,
    pub unresolved: usize,
}

impl PipelineOutput {
    /// Survivors as blacklist-ip-specific entries
    pub fn entries(&self) -> Vec<Entry> {
        self.entries_as(ListKind::BlacklistIpSpecific)
    }

    /// Survivors as entries of `kind`
    pub fn entries_as(&self, kind: ListKind) -> Vec<Entry> {
        self.survivors
            .iter()
            .map(|(ip, label)| Entry {
                pattern: ip.to_string(),
                source_label: label.clone(),
                kind,
            })
            .collect()
    }
}

/// Orchestrates one or more resolution runs over a shared resolver
pub struct ResolutionPipeline<R: NameResolver> {
    resolver: ConcurrentResolver<R>,
    tables: Arc<ProtectionTables>,
    label_prefix: String,
    stage: Stage,
}

impl<R: NameResolver> ResolutionPipeline<R> {
    pub fn new(resolver: ConcurrentResolver<R>, label_prefix: &str) -> Self {
        Self {
            resolver,
            tables: ProtectionTables::builtin(),
            label_prefix: label_prefix.to_string(),
            stage: Stage::Init,
        }
    }

    /// Replace the infrastructure/bogon tables
    pub fn with_tables(mut self, tables: Arc<ProtectionTables>) -> Self {
        self.tables = tables;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn resolver(&self) -> &ConcurrentResolver<R> {
        &self.resolver
    }

    /// Resolve `blacklist` domains to protected IP entries.
    ///
    /// Wildcard patterns are not resolvable and are skipped. Resolution
    /// failures contribute no addresses. When several blacklist domains
    /// yield the same address, the label of the lexicographically first
    /// domain is kept, so identical inputs always give identical output.
    pub async fn run(
        &mut self,
        blacklist: &PriorityList,
        whitelist: &PriorityList,
        concurrency: usize,
    ) -> PipelineOutput {
        self.stage = Stage::Init;
        let mut output = PipelineOutput::default();

        self.stage = Stage::SeedWhitelist;
        let (whitelist_domains, _) = resolvable(whitelist);
        output.whitelist_domains = whitelist_domains.len();
        info!(
            "Resolving {} whitelist domains for shared IP protection...",
            whitelist_domains.len()
        );
        let seeded = self
            .resolver
            .resolve_all(&whitelist_domains, concurrency)
            .await;
        let shared_ips: HashSet<IpAddr> = seeded.all_ips();
        output.shared_ips = shared_ips.len();
        info!("Found {} shared IPs from whitelist domains", shared_ips.len());

        self.stage = Stage::ResolveBlacklist;
        let (blacklist_domains, wildcards) = resolvable(blacklist);
        output.blacklist_domains = blacklist_domains.len();
        output.wildcards_skipped = wildcards;
        info!(
            "Resolving {} blacklist domains ({} wildcards skipped)...",
            blacklist_domains.len(),
            wildcards
        );
        let resolved = self
            .resolver
            .resolve_all(&blacklist_domains, concurrency)
            .await;

        let filter = ProtectionFilter::with_tables(shared_ips, self.tables.clone());
        let sources = sources(blacklist);

        // Sorted by domain for a deterministic first-wins label
        let ordered: BTreeMap<&String, _> = resolved.resolved().collect();
        output.unresolved = blacklist_domains.len() - ordered.len();

        for (domain, ips) in ordered {
            let source = sources.get(domain.as_str()).copied().unwrap_or_default();
            for ip in ips {
                if !filter.admit(ip, domain, &mut output.stats) {
                    continue;
                }
                output
                    .survivors
                    .entry(*ip)
                    .or_insert_with(|| self.label(domain, source));
            }
        }

        self.stage = Stage::Done;
        log_summary(&output);
        output
    }

    /// Resolve `whitelist` domains to whitelist-ip-specific entries.
    ///
    /// No protection stage applies, every answer is kept. Wildcards are
    /// skipped and duplicate addresses keep the first domain's label, as in
    /// [`run`](Self::run).
    pub async fn run_whitelist(
        &mut self,
        whitelist: &PriorityList,
        concurrency: usize,
    ) -> PipelineOutput {
        self.stage = Stage::Init;
        let mut output = PipelineOutput::default();

        self.stage = Stage::ResolveWhitelist;
        let (domains, wildcards) = resolvable(whitelist);
        output.whitelist_domains = domains.len();
        output.wildcards_skipped = wildcards;
        info!(
            "Resolving {} whitelist domains ({} wildcards skipped)...",
            domains.len(),
            wildcards
        );
        let resolved = self.resolver.resolve_all(&domains, concurrency).await;

        let sources = sources(whitelist);
        let ordered: BTreeMap<&String, _> = resolved.resolved().collect();
        output.unresolved = domains.len() - ordered.len();

        for (domain, ips) in ordered {
            let source = sources.get(domain.as_str()).copied().unwrap_or_default();
            for ip in ips {
                output.stats.survived += 1;
                output
                    .survivors
                    .entry(*ip)
                    .or_insert_with(|| self.label(domain, source));
            }
        }

        self.stage = Stage::Done;
        info!(
            "Resolved {} whitelist domains ({} unresolved) into {} unique IPs",
            output.whitelist_domains,
            output.unresolved,
            output.survivors.len()
        );
        output
    }

    fn label(&self, domain: &str, source: &str) -> String {
        format!("{} {} ({})", self.label_prefix, domain, source)
    }
}

/// Convenience wrapper: one run with the builtin tables.
pub async fn resolve_blacklist<R: NameResolver>(
    blacklist: &PriorityList,
    whitelist: &PriorityList,
    resolver: ConcurrentResolver<R>,
    concurrency: usize,
) -> PipelineOutput {
    ResolutionPipeline::new(resolver, "resolved from")
        .run(blacklist, whitelist, concurrency)
        .await
}

fn sources(list: &PriorityList) -> BTreeMap<&str, &str> {
    list.entries()
        .iter()
        .map(|e| (e.pattern.as_str(), e.source_label.as_str()))
        .collect()
}

/// Non-wildcard domain patterns of a list, plus the wildcard count.
fn resolvable(list: &PriorityList) -> (Vec<String>, usize) {
    let mut domains = Vec::new();
    let mut wildcards = 0;
    for entry in list.entries() {
        if entry.pattern.starts_with('*') {
            wildcards += 1;
            debug!("Not resolving wildcard {}", entry.pattern);
        } else {
            domains.push(entry.pattern.clone());
        }
    }
    (domains, wildcards)
}

fn log_summary(output: &PipelineOutput) {
    let s = &output.stats;
    info!("Protection statistics:");
    info!("  - Shared IPs skipped: {}", s.shared_ip_skipped);
    info!("  - Infrastructure IPs skipped: {}", s.infrastructure_skipped);
    info!("  - Bogon/reserved IPs skipped: {}", s.bogon_skipped);
    info!("  - Total protected: {}", s.total_protected());
    info!(
        "Resolved {} blacklist domains ({} unresolved) into {} unique IPs",
        output.blacklist_domains,
        output.unresolved,
        output.survivors.len()
    );
}
