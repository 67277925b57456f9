//! Bounded-concurrency name resolution.
//!
//! The resolution primitive is abstracted behind [`NameResolver`] so the
//! pipeline can be driven by the system resolver in production and by a
//! deterministic table in tests. [`ConcurrentResolver`] fans a batch of
//! domains out over at most `concurrency` in-flight lookups, applies a
//! per-lookup timeout with retry, and absorbs every failure into a
//! per-domain result so one bad domain never aborts the batch.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::error::{PangrosanError, Result};

#[cfg(test)]
use mockall::automock;

/// Backoff base between retries, doubled per attempt
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Ceiling for a single backoff sleep
const MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Timeout for reverse (PTR) lookups
const PTR_TIMEOUT_SECS: u64 = 5;

/// A single-name resolution primitive.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Resolve `domain` to its addresses, giving up after `timeout`.
    async fn resolve(&self, domain: &str, timeout: Duration) -> Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo`) on blocking threads.
///
/// A blocking lookup cannot be cancelled, so a timed-out call keeps its
/// thread until `getaddrinfo` returns. Each thread holds a semaphore permit
/// for its whole life, which caps the number of live lookups at
/// `max_in_flight` even when callers have already given up on them.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    permits: Arc<Semaphore>,
}

impl SystemResolver {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }
}

#[async_trait]
impl NameResolver for SystemResolver {
    async fn resolve(&self, domain: &str, timeout: Duration) -> Result<Vec<IpAddr>> {
        let host = domain.to_string();
        let permits = self.permits.clone();
        let lookup = async move {
            let Ok(permit) = permits.acquire_owned().await else {
                return Err(String::from("resolver closed"));
            };
            match spawn_bounded(permit, move || dns_lookup::lookup_host(&host)).await {
                Ok(Ok(ips)) => Ok(ips),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("task failed: {}", e)),
            }
        };

        match tokio::time::timeout(timeout, lookup).await {
            Ok(Ok(ips)) => Ok(ips),
            Ok(Err(reason)) => Err(PangrosanError::resolution(domain, reason)),
            Err(_) => Err(PangrosanError::resolution(domain, "timeout")),
        }
    }
}

/// Run `f` on the blocking pool, releasing `permit` only when `f` returns.
fn spawn_bounded<F, T>(permit: OwnedSemaphorePermit, f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        f()
    })
}

/// Resolver answering from a fixed table. Unknown names fail like NXDOMAIN.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    answers: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an answer for `domain`.
    pub fn with(mut self, domain: &str, ips: &[IpAddr]) -> Self {
        self.answers
            .entry(domain.to_ascii_lowercase())
            .or_default()
            .extend_from_slice(ips);
        self
    }
}

#[async_trait]
impl NameResolver for StaticResolver {
    async fn resolve(&self, domain: &str, _timeout: Duration) -> Result<Vec<IpAddr>> {
        self.answers
            .get(&domain.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| PangrosanError::resolution(domain, "NXDOMAIN"))
    }
}

/// Counters for one batch
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub total: usize,
    pub resolved: usize,
    pub cached: usize,
    pub failed: usize,
    pub unique_ips: usize,
    pub elapsed: Duration,
}

/// Results of one batch, keyed by domain
#[derive(Debug, Default)]
pub struct Resolutions {
    pub outcomes: HashMap<String, Result<BTreeSet<IpAddr>>>,
    pub stats: BatchStats,
}

impl Resolutions {
    /// Addresses for `domain`; empty if it failed or was not in the batch.
    pub fn ips(&self, domain: &str) -> BTreeSet<IpAddr> {
        match self.outcomes.get(domain) {
            Some(Ok(ips)) => ips.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// Successfully resolved domains with their addresses.
    pub fn resolved(&self) -> impl Iterator<Item = (&String, &BTreeSet<IpAddr>)> {
        self.outcomes
            .iter()
            .filter_map(|(domain, outcome)| outcome.as_ref().ok().map(|ips| (domain, ips)))
    }

    /// Union of every resolved address.
    pub fn all_ips(&self) -> HashSet<IpAddr> {
        self.resolved().flat_map(|(_, ips)| ips.iter().copied()).collect()
    }
}

/// Bounded fan-out over a [`NameResolver`], with optional answer cache.
pub struct ConcurrentResolver<R: NameResolver> {
    inner: R,
    config: ResolverConfig,
    cache: Mutex<HashMap<String, BTreeSet<IpAddr>>>,
}

impl<R: NameResolver> ConcurrentResolver<R> {
    pub fn new(inner: R, config: ResolverConfig) -> Self {
        Self {
            inner,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Number of cached domains
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Resolve a batch with at most `concurrency` lookups in flight.
    ///
    /// Duplicate domains are resolved once. Failures are recorded per domain
    /// and never abort the batch.
    pub async fn resolve_all(&self, domains: &[String], concurrency: usize) -> Resolutions {
        let start = Instant::now();
        let unique: BTreeSet<&str> = domains.iter().map(String::as_str).collect();
        let concurrency = concurrency.max(1);

        info!(
            "Starting DNS resolution for {} domains (workers={}, timeout={}s, cache={})",
            unique.len(),
            concurrency,
            self.config.timeout_secs,
            if self.config.cache { "enabled" } else { "disabled" }
        );

        let results: Vec<(String, Result<BTreeSet<IpAddr>>, bool)> =
            stream::iter(unique.into_iter().map(|domain| self.resolve_one(domain)))
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut stats = BatchStats {
            total: results.len(),
            ..BatchStats::default()
        };
        let mut outcomes = HashMap::with_capacity(results.len());

        for (domain, outcome, cached) in results {
            match &outcome {
                Ok(_) if cached => stats.cached += 1,
                Ok(_) => stats.resolved += 1,
                Err(e) => {
                    stats.failed += 1;
                    debug!("{}", e);
                }
            }
            outcomes.insert(domain, outcome);
        }

        let mut resolutions = Resolutions { outcomes, stats };
        resolutions.stats.unique_ips = resolutions.all_ips().len();
        resolutions.stats.elapsed = start.elapsed();

        let s = &resolutions.stats;
        info!(
            "DNS resolution complete: {} total, {} resolved, {} cached, {} failed, {} unique IPs in {:.1}s",
            s.total,
            s.resolved,
            s.cached,
            s.failed,
            s.unique_ips,
            s.elapsed.as_secs_f64()
        );

        resolutions
    }

    /// Resolve one domain with timeout and retry.
    ///
    /// Returns the domain, the outcome and whether it came from the cache.
    async fn resolve_one(&self, domain: &str) -> (String, Result<BTreeSet<IpAddr>>, bool) {
        if self.config.cache {
            if let Some(ips) = self.cached(domain) {
                return (domain.to_string(), Ok(ips), true);
            }
        }

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut last_error = String::from("no addresses");

        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tokio::time::sleep(retry_delay(attempt)).await;
            }

            match tokio::time::timeout(timeout, self.inner.resolve(domain, timeout)).await {
                Ok(Ok(answers)) => {
                    let ips: BTreeSet<IpAddr> = answers
                        .into_iter()
                        .filter(|ip| !self.config.ipv4_only || ip.is_ipv4())
                        .collect();
                    if !ips.is_empty() {
                        debug!("{} -> {:?}", domain, ips);
                        if self.config.cache {
                            if let Ok(mut cache) = self.cache.lock() {
                                cache.insert(domain.to_string(), ips.clone());
                            }
                        }
                        return (domain.to_string(), Ok(ips), false);
                    }
                    last_error = String::from("no addresses");
                }
                Ok(Err(PangrosanError::Resolution { reason, .. })) => last_error = reason,
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = String::from("timeout"),
            }
        }

        (
            domain.to_string(),
            Err(PangrosanError::resolution(domain, last_error)),
            false,
        )
    }

    fn cached(&self, domain: &str) -> Option<BTreeSet<IpAddr>> {
        self.cache.lock().ok()?.get(domain).cloned()
    }
}

/// Backoff before retry `attempt` (1-based): 100ms, 200ms, 400ms... capped.
fn retry_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(factor).min(MAX_RETRY_DELAY_MS))
}

/// Reverse (PTR) lookup with timeout, for display.
///
/// Returns the hostname, or a short parenthesized reason on failure.
pub async fn resolve_ptr(ip: IpAddr) -> String {
    let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip));

    match tokio::time::timeout(Duration::from_secs(PTR_TIMEOUT_SECS), lookup).await {
        Ok(Ok(Ok(hostname))) => hostname,
        Ok(Ok(Err(_))) => "(no PTR)".to_string(),
        Ok(Err(_)) => "(DNS failed)".to_string(),
        Err(_) => "(DNS timeout)".to_string(),
    }
}
