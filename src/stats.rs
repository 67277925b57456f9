//! Summary of the last resolution run.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pipeline::PipelineOutput;
use crate::priority::ListKind;
use crate::protection::ProtectionStats;
use crate::store::Reconciled;
use crate::utils::{format_count, format_duration_ago};

const STATE_FILE: &str = "state.json";

/// Persisted after every non-dry resolution run
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ResolutionState {
    pub last_run: Option<DateTime<Utc>>,
    pub whitelist_domains: usize,
    pub shared_ips: usize,
    pub blacklist_domains: usize,
    pub wildcards_skipped: usize,
    pub unresolved: usize,
    pub survivors: usize,
    pub protection: ProtectionStats,
    pub added: usize,
    pub updated: usize,
    pub removed_stale: usize,
    pub removed_whitelisted: usize,
    pub total_entries: usize,
}

impl ResolutionState {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(STATE_FILE)
    }

    /// Load the state, or the default when no run has been recorded.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        crate::store::write_atomic(&Self::path(data_dir), content.as_bytes())
            .context("Failed to write run state")
    }

    pub fn record(output: &PipelineOutput, reconciled: &Reconciled) -> Self {
        Self {
            last_run: Some(Utc::now()),
            whitelist_domains: output.whitelist_domains,
            shared_ips: output.shared_ips,
            blacklist_domains: output.blacklist_domains,
            wildcards_skipped: output.wildcards_skipped,
            unresolved: output.unresolved,
            survivors: output.survivors.len(),
            protection: output.stats,
            added: reconciled.added,
            updated: reconciled.updated,
            removed_stale: reconciled.removed_stale,
            removed_whitelisted: reconciled.removed_whitelisted,
            total_entries: reconciled.entries.len(),
        }
    }
}

/// Print the last run summary.
pub fn display_stats(state: &ResolutionState) {
    println!();
    println!("══════════════════════════════════════════════════════════════════");
    println!(" PANGROSAN RESOLUTION STATISTICS");
    println!("══════════════════════════════════════════════════════════════════");
    println!();

    let Some(last_run) = state.last_run else {
        println!(" Last run: never");
        println!(" Run 'pangrosan resolve' to populate {}", ListKind::BlacklistIpSpecific);
        println!("══════════════════════════════════════════════════════════════════");
        println!();
        return;
    };

    println!(" DOMAINS");
    println!(" ────────────────────────────────────────────────────────────────");
    println!(" Whitelist domains resolved: {:>12}", format_count(state.whitelist_domains));
    println!(" Shared IPs found:           {:>12}", format_count(state.shared_ips));
    println!(" Blacklist domains resolved: {:>12}", format_count(state.blacklist_domains));
    println!(" Wildcards skipped:          {:>12}", format_count(state.wildcards_skipped));
    println!(" Unresolved:                 {:>12}", format_count(state.unresolved));
    println!();

    let p = &state.protection;
    println!(" PROTECTION");
    println!(" ────────────────────────────────────────────────────────────────");
    println!(" Shared IPs skipped:         {:>12}", format_count(p.shared_ip_skipped));
    println!(" Infrastructure skipped:     {:>12}", format_count(p.infrastructure_skipped));
    println!(" Bogon/reserved skipped:     {:>12}", format_count(p.bogon_skipped));
    println!(" Total protected:            {:>12}", format_count(p.total_protected()));
    println!(" Survived:                   {:>12}", format_count(p.survived));
    println!();

    println!(" {}", ListKind::BlacklistIpSpecific.title().to_uppercase());
    println!(" ────────────────────────────────────────────────────────────────");
    println!(" Added:                      {:>12}", format_count(state.added));
    println!(" Updated:                    {:>12}", format_count(state.updated));
    println!(" Stale removed:              {:>12}", format_count(state.removed_stale));
    println!(" Whitelisted removed:        {:>12}", format_count(state.removed_whitelisted));
    println!(" Total entries:              {:>12}", format_count(state.total_entries));
    println!();

    let local: DateTime<Local> = last_run.into();
    println!(
        " Last run: {} ({})",
        local.format("%Y-%m-%d %H:%M:%S"),
        format_duration_ago(last_run, Utc::now())
    );
    println!("══════════════════════════════════════════════════════════════════");
    println!();
}
