//! Triple protection applied to every candidate IP before it may enter the
//! resolved blacklist.
//!
//! Stages run in order and short-circuit on the first hit:
//!
//! 1. **Shared IP** - the address is used by a whitelisted domain
//! 2. **Infrastructure** - public resolvers, root servers, NTP pools
//! 3. **Bogon** - private, reserved, loopback, link-local, multicast ranges

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::address::{contains, parse_address, parse_cidr};

/// Critical internet infrastructure that must never be blacklisted.
pub const INFRASTRUCTURE_IPS: &[&str] = &[
    // Google Public DNS
    "8.8.8.8",
    "8.8.4.4",
    "2001:4860:4860::8888",
    "2001:4860:4860::8844",
    // Cloudflare DNS
    "1.1.1.1",
    "1.0.0.1",
    "2606:4700:4700::1111",
    "2606:4700:4700::1001",
    // Quad9
    "9.9.9.9",
    "149.112.112.112",
    "2620:fe::fe",
    "2620:fe::9",
    // OpenDNS
    "208.67.222.222",
    "208.67.220.220",
    // Root servers A-M
    "198.41.0.4",
    "170.247.170.2",
    "199.9.14.201",
    "192.33.4.12",
    "199.7.91.13",
    "192.203.230.10",
    "192.5.5.241",
    "192.112.36.4",
    "198.97.190.53",
    "192.36.148.17",
    "192.58.128.30",
    "193.0.14.129",
    "199.7.83.42",
    "202.12.27.33",
    "2001:503:ba3e::2:30",
    "2001:500:200::b",
    "2001:500:2::c",
    "2001:500:2d::d",
    "2001:500:2f::f",
    "2001:7fe::53",
    "2001:503:c27::2:30",
    "2001:7fd::1",
    "2001:500:9f::42",
    "2001:dc3::35",
    // NTP
    "216.239.35.0",
    "216.239.35.4",
    "216.239.35.8",
    "216.239.35.12",
    "162.159.200.1",
    "162.159.200.123",
    "129.6.15.28",
    "129.6.15.29",
];

/// Reserved, private and otherwise unroutable ranges.
pub const BOGON_RANGES: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "::/128",
    "::1/128",
    "::ffff:0:0/96",
    "100::/64",
    "2001:db8::/32",
    "fc00::/7",
    "fe80::/10",
    "ff00::/8",
];

/// Rule tables used by the infrastructure and bogon stages.
#[derive(Debug, Clone)]
pub struct ProtectionTables {
    infrastructure: HashSet<IpAddr>,
    bogons: Vec<IpNet>,
}

impl ProtectionTables {
    /// Build tables from explicit data (used to substitute smaller tables).
    pub fn new(infrastructure: impl IntoIterator<Item = IpAddr>, bogons: Vec<IpNet>) -> Self {
        Self {
            infrastructure: infrastructure.into_iter().collect(),
            bogons,
        }
    }

    /// The compiled-in tables.
    pub fn builtin() -> Arc<Self> {
        static TABLES: OnceLock<Arc<ProtectionTables>> = OnceLock::new();
        TABLES
            .get_or_init(|| {
                Arc::new(Self::new(
                    INFRASTRUCTURE_IPS.iter().filter_map(|s| parse_address(s).ok()),
                    BOGON_RANGES.iter().filter_map(|s| parse_cidr(s).ok()).collect(),
                ))
            })
            .clone()
    }

    pub fn is_infrastructure(&self, ip: &IpAddr) -> bool {
        self.infrastructure.contains(ip)
    }

    pub fn is_bogon(&self, ip: &IpAddr) -> bool {
        self.bogons.iter().any(|net| contains(net, ip))
    }

    pub fn infrastructure_len(&self) -> usize {
        self.infrastructure.len()
    }
}

/// Outcome of running one candidate through the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Survived,
    SharedIp,
    Infrastructure,
    Bogon,
}

/// Per-run protection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionStats {
    pub shared_ip_skipped: usize,
    pub infrastructure_skipped: usize,
    pub bogon_skipped: usize,
    pub survived: usize,
}

impl ProtectionStats {
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Survived => self.survived += 1,
            Verdict::SharedIp => self.shared_ip_skipped += 1,
            Verdict::Infrastructure => self.infrastructure_skipped += 1,
            Verdict::Bogon => self.bogon_skipped += 1,
        }
    }

    pub fn total_protected(&self) -> usize {
        self.shared_ip_skipped + self.infrastructure_skipped + self.bogon_skipped
    }
}

/// The three-stage candidate filter
#[derive(Debug, Clone)]
pub struct ProtectionFilter {
    shared_ips: HashSet<IpAddr>,
    tables: Arc<ProtectionTables>,
}

impl ProtectionFilter {
    /// Filter backed by the compiled-in tables.
    pub fn new(shared_ips: HashSet<IpAddr>) -> Self {
        Self::with_tables(shared_ips, ProtectionTables::builtin())
    }

    pub fn with_tables(shared_ips: HashSet<IpAddr>, tables: Arc<ProtectionTables>) -> Self {
        Self { shared_ips, tables }
    }

    pub fn shared_ips(&self) -> &HashSet<IpAddr> {
        &self.shared_ips
    }

    /// Classify a candidate without side effects.
    pub fn check(&self, ip: &IpAddr) -> Verdict {
        if self.shared_ips.contains(ip) {
            Verdict::SharedIp
        } else if self.tables.is_infrastructure(ip) {
            Verdict::Infrastructure
        } else if self.tables.is_bogon(ip) {
            Verdict::Bogon
        } else {
            Verdict::Survived
        }
    }

    /// Run a candidate resolved from `domain` through the filter, recording
    /// the outcome. Returns `true` if the candidate survived.
    pub fn admit(&self, ip: &IpAddr, domain: &str, stats: &mut ProtectionStats) -> bool {
        let verdict = self.check(ip);
        stats.record(verdict);

        match verdict {
            Verdict::Survived => true,
            Verdict::SharedIp => {
                debug!("Skipping shared IP {} from {} (used by whitelist domains)", ip, domain);
                false
            }
            Verdict::Infrastructure => {
                warn!(
                    "PROTECTED: skipping infrastructure IP {} from {} (DNS/critical service)",
                    ip, domain
                );
                false
            }
            Verdict::Bogon => {
                debug!("Skipping bogon IP {} from {} (reserved/private)", ip, domain);
                false
            }
        }
    }
}
