//! Configuration management for Pangrosan.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::priority::ListKind;

/// Default number of concurrent DNS lookups
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Default per-lookup timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Upper bound for `resolver.retries`
pub const MAX_RETRIES: u32 = 5;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the list files and the whois cache
    pub data_dir: PathBuf,

    /// File names inside `data_dir`
    pub files: ListFiles,

    /// Name resolution settings
    pub resolver: ResolverConfig,

    /// Only the first N blacklist domains are resolved (none = all)
    pub max_blacklist_domains: Option<usize>,

    /// Label prefix marking entries produced by domain resolution
    pub label_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            files: ListFiles::default(),
            resolver: ResolverConfig::default(),
            max_blacklist_domains: None,
            label_prefix: "resolved from".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.resolver.concurrency == 0 {
            anyhow::bail!("resolver.concurrency must be at least 1");
        }

        if self.resolver.timeout_secs == 0 {
            anyhow::bail!("resolver.timeout_secs must be at least 1");
        }

        if self.resolver.retries > MAX_RETRIES {
            anyhow::bail!(
                "resolver.retries must be at most {} (got {})",
                MAX_RETRIES,
                self.resolver.retries
            );
        }

        if self.label_prefix.trim().is_empty() {
            anyhow::bail!("label_prefix cannot be empty");
        }

        let mut names: Vec<&str> = ListKind::ALL
            .iter()
            .map(|kind| self.files.for_kind(*kind))
            .collect();
        names.push(&self.files.whois);
        names.push(&self.files.hosts);

        for name in names {
            if name.is_empty() {
                anyhow::bail!("List file names cannot be empty");
            }
            if name.contains('/') || name.contains('\\') || name == ".." {
                anyhow::bail!(
                    "List file name '{}' must be a plain file name inside data_dir",
                    name
                );
            }
        }

        Ok(())
    }

    /// Save configuration to YAML file atomically
    ///
    /// Uses tempfile + rename pattern to prevent corruption on crash.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        crate::store::write_atomic(path.as_ref(), content.as_bytes())
            .with_context(|| format!("Failed to persist config file: {:?}", path.as_ref()))
    }

    /// Path of the file holding `kind`
    pub fn list_path(&self, kind: ListKind) -> PathBuf {
        self.data_dir.join(self.files.for_kind(kind))
    }

    pub fn whois_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.whois)
    }

    pub fn hosts_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.hosts)
    }
}

/// File names for each list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFiles {
    pub whitelist_specific: String,
    pub blacklist_specific: String,
    pub blacklist_segment: String,
    pub whitelist_segment: String,
    pub whitelist_domain: String,
    pub blacklist_domain: String,
    pub whois: String,
    /// Hosts-format export of the blacklist domains
    pub hosts: String,
}

impl Default for ListFiles {
    fn default() -> Self {
        Self {
            whitelist_specific: "whitelist-specific.txt".to_string(),
            blacklist_specific: "blacklist-specific.txt".to_string(),
            blacklist_segment: "drop.txt".to_string(),
            whitelist_segment: "pass.txt".to_string(),
            whitelist_domain: "whitelist.txt".to_string(),
            blacklist_domain: "blacklist.txt".to_string(),
            whois: "whois.txt".to_string(),
            hosts: "hosts.txt".to_string(),
        }
    }
}

impl ListFiles {
    pub fn for_kind(&self, kind: ListKind) -> &str {
        match kind {
            ListKind::WhitelistIpSpecific => &self.whitelist_specific,
            ListKind::BlacklistIpSpecific => &self.blacklist_specific,
            ListKind::BlacklistIpSegment => &self.blacklist_segment,
            ListKind::WhitelistIpSegment => &self.whitelist_segment,
            ListKind::WhitelistDomain => &self.whitelist_domain,
            ListKind::BlacklistDomain => &self.blacklist_domain,
        }
    }
}

/// Name resolution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum in-flight lookups
    pub concurrency: usize,
    /// Per-lookup timeout
    pub timeout_secs: u64,
    /// Extra attempts after a failed lookup
    pub retries: u32,
    /// Keep only IPv4 answers
    pub ipv4_only: bool,
    /// Reuse answers for domains already resolved by the same resolver
    pub cache: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: 2,
            ipv4_only: true,
            cache: true,
        }
    }
}
