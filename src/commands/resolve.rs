//! Resolve command implementation.
//!
//! Turns blacklist domains into blacklist-specific IP entries, reconciles
//! them with what is already on disk and writes the result. With
//! `--whitelist` the same flow turns whitelist domains into
//! whitelist-specific entries, without protection filtering.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info};

use crate::config::Config;
use crate::lock::LockGuard;
use crate::pipeline::{PipelineOutput, ResolutionPipeline};
use crate::priority::{ListKind, PriorityList};
use crate::resolver::{ConcurrentResolver, NameResolver, SystemResolver};
use crate::stats::ResolutionState;
use crate::store::{self, Reconciled};

/// What a run produced, written or not
#[derive(Debug)]
pub struct ResolveReport {
    pub output: PipelineOutput,
    pub reconciled: Reconciled,
    pub written: bool,
}

/// Run the resolve command
pub async fn run(concurrency: Option<usize>, dry_run: bool, config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let resolver = SystemResolver::new(concurrency.unwrap_or(config.resolver.concurrency));
    let report = execute(&config, resolver, concurrency, dry_run).await?;

    println!();
    if report.written {
        println!(
            "[OK] {} now holds {} entries (+{} added, {} updated, -{} stale, -{} whitelisted)",
            config.files.blacklist_specific,
            report.reconciled.entries.len(),
            report.reconciled.added,
            report.reconciled.updated,
            report.reconciled.removed_stale,
            report.reconciled.removed_whitelisted,
        );
    } else {
        println!(
            "[DRY-RUN] Would write {} entries to {} ({} new IPs from {} domains)",
            report.reconciled.entries.len(),
            config.files.blacklist_specific,
            report.reconciled.added,
            report.output.blacklist_domains,
        );
    }
    println!();
    Ok(())
}

/// Run the resolve command in whitelist mode
pub async fn run_whitelist(
    concurrency: Option<usize>,
    dry_run: bool,
    config_path: &Path,
) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let resolver = SystemResolver::new(concurrency.unwrap_or(config.resolver.concurrency));
    let report = execute_whitelist(&config, resolver, concurrency, dry_run).await?;

    println!();
    if report.written {
        println!(
            "[OK] {} now holds {} entries (+{} added, {} updated, -{} stale)",
            config.files.whitelist_specific,
            report.reconciled.entries.len(),
            report.reconciled.added,
            report.reconciled.updated,
            report.reconciled.removed_stale,
        );
    } else {
        println!(
            "[DRY-RUN] Would write {} entries to {} ({} new IPs from {} domains)",
            report.reconciled.entries.len(),
            config.files.whitelist_specific,
            report.reconciled.added,
            report.output.whitelist_domains,
        );
    }
    println!();
    Ok(())
}

/// Full resolve flow over any resolver.
pub async fn execute<R: NameResolver>(
    config: &Config,
    resolver: R,
    concurrency: Option<usize>,
    dry_run: bool,
) -> Result<ResolveReport> {
    let concurrency = effective_concurrency(config, concurrency)?;

    // Dry runs write nothing, so they don't contend for the lock
    let _lock = if dry_run {
        None
    } else {
        Some(LockGuard::acquire(&config.data_dir)?)
    };

    let blacklist = load(config, ListKind::BlacklistDomain)?;
    let blacklist = match config.max_blacklist_domains {
        Some(max) => limit_domains(blacklist, max)?,
        None => blacklist,
    };
    let whitelist = load(config, ListKind::WhitelistDomain)?;

    let resolver = ConcurrentResolver::new(resolver, config.resolver.clone());
    let mut pipeline = ResolutionPipeline::new(resolver, &config.label_prefix);
    let output = pipeline.run(&blacklist, &whitelist, concurrency).await;

    let specific_path = config.list_path(ListKind::BlacklistIpSpecific);
    let existing = store::load_batch(&specific_path)?;
    let whitelist_ips = load(config, ListKind::WhitelistIpSpecific)?;
    let reconciled = store::reconcile_resolved(
        existing,
        &output.survivors,
        &whitelist_ips,
        &config.label_prefix,
    );

    if !dry_run {
        if let Err(e) =
            store::write_entries(&specific_path, ListKind::BlacklistIpSpecific, &reconciled.entries)
        {
            error!("Failed to write {}: {}", specific_path.display(), e);
            return Err(e.into());
        }
        ResolutionState::record(&output, &reconciled).save(&config.data_dir)?;
    }

    Ok(ResolveReport {
        output,
        reconciled,
        written: !dry_run,
    })
}

/// Whitelist flow: whitelist domains to whitelist-specific entries.
///
/// Every resolved address is kept. Entries labelled with the configured
/// prefix that no longer resolve are dropped, manual entries stay.
pub async fn execute_whitelist<R: NameResolver>(
    config: &Config,
    resolver: R,
    concurrency: Option<usize>,
    dry_run: bool,
) -> Result<ResolveReport> {
    let concurrency = effective_concurrency(config, concurrency)?;

    let _lock = if dry_run {
        None
    } else {
        Some(LockGuard::acquire(&config.data_dir)?)
    };

    let whitelist = load(config, ListKind::WhitelistDomain)?;

    let resolver = ConcurrentResolver::new(resolver, config.resolver.clone());
    let mut pipeline = ResolutionPipeline::new(resolver, &config.label_prefix);
    let output = pipeline.run_whitelist(&whitelist, concurrency).await;

    let specific_path = config.list_path(ListKind::WhitelistIpSpecific);
    let existing = store::load_batch(&specific_path)?;
    let reconciled = store::reconcile_resolved(
        existing,
        &output.survivors,
        &PriorityList::empty(ListKind::WhitelistIpSpecific),
        &config.label_prefix,
    );

    if !dry_run {
        if let Err(e) =
            store::write_entries(&specific_path, ListKind::WhitelistIpSpecific, &reconciled.entries)
        {
            error!("Failed to write {}: {}", specific_path.display(), e);
            return Err(e.into());
        }
    }

    Ok(ResolveReport {
        output,
        reconciled,
        written: !dry_run,
    })
}

fn effective_concurrency(config: &Config, concurrency: Option<usize>) -> Result<usize> {
    let concurrency = concurrency.unwrap_or(config.resolver.concurrency);
    if concurrency == 0 {
        anyhow::bail!("--concurrency must be at least 1");
    }
    Ok(concurrency)
}

/// Keep the first `max` resolvable domains. Wildcards are never resolved,
/// so they don't count toward the cap and are dropped here.
fn limit_domains(blacklist: PriorityList, max: usize) -> Result<PriorityList> {
    let resolvable: Vec<_> = blacklist
        .entries()
        .iter()
        .filter(|e| !e.pattern.starts_with('*'))
        .collect();
    if resolvable.len() <= max {
        return Ok(blacklist);
    }

    info!(
        "Limiting to first {} of {} blacklist domains",
        max,
        resolvable.len()
    );
    Ok(PriorityList::build(
        ListKind::BlacklistDomain,
        resolvable
            .into_iter()
            .take(max)
            .map(|e| (e.pattern.clone(), e.source_label.clone())),
    )?)
}

fn load(config: &Config, kind: ListKind) -> Result<PriorityList> {
    let path = config.list_path(kind);
    store::load_list(&path, kind).with_context(|| format!("Failed to load {}", path.display()))
}
