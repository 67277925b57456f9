//! Address matching primitives.
//!
//! Parsing of IP literals, CIDR ranges and domain patterns, plus the
//! prefix containment test used by every IP rule. Containment is computed
//! on the fixed-width integer form of an address (32-bit for IPv4, 128-bit
//! for IPv6); addresses of different families never match.

use ipnet::IpNet;
use std::net::IpAddr;

use crate::error::{PangrosanError, Result};

/// Parse an IPv4 or IPv6 literal.
///
/// # Examples
/// ```
/// use pangrosan::address::parse_address;
/// assert!(parse_address("192.168.1.1").is_ok());
/// assert!(parse_address("::1").is_ok());
/// assert!(parse_address("example.com").is_err());
/// ```
pub fn parse_address(s: &str) -> Result<IpAddr> {
    s.trim()
        .parse()
        .map_err(|_| PangrosanError::parse(format!("Invalid IP address: {}", s)))
}

/// Parse a CIDR range (`base/prefix`).
///
/// Fails when there is no `/`, when the base is not an address, or when the
/// prefix is out of range for the family (0-32 for IPv4, 0-128 for IPv6).
/// Host bits in the base are allowed and ignored by [`contains`].
///
/// # Examples
/// ```
/// use pangrosan::address::parse_cidr;
/// assert!(parse_cidr("10.0.0.0/8").is_ok());
/// assert!(parse_cidr("2001:db8::/32").is_ok());
/// assert!(parse_cidr("10.0.0.0/33").is_err());
/// assert!(parse_cidr("10.0.0.0").is_err());
/// ```
pub fn parse_cidr(s: &str) -> Result<IpNet> {
    let s = s.trim();
    let (base, prefix) = s
        .split_once('/')
        .ok_or_else(|| PangrosanError::parse(format!("Invalid CIDR (missing prefix): {}", s)))?;

    let addr = parse_address(base)?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| PangrosanError::parse(format!("Invalid CIDR prefix: {}", s)))?;

    let max = max_prefix(&addr);
    if prefix > max {
        return Err(PangrosanError::parse(format!(
            "Invalid CIDR: prefix /{} out of range 0-{} in {}",
            prefix, max, s
        )));
    }

    IpNet::new(addr, prefix).map_err(|_| PangrosanError::parse(format!("Invalid CIDR: {}", s)))
}

/// Parse an exact address or a CIDR range.
///
/// A plain address becomes a full-width network (/32 or /128), so exact and
/// ranged patterns share one matching path.
pub fn parse_ip_or_cidr(s: &str) -> Result<IpNet> {
    if s.contains('/') {
        parse_cidr(s)
    } else {
        parse_address(s).map(IpNet::from)
    }
}

/// Whether `net` contains `addr`, by mask-and-compare on the integer form.
pub fn contains(net: &IpNet, addr: &IpAddr) -> bool {
    match (net, addr) {
        (IpNet::V4(n), IpAddr::V4(a)) => {
            let mask = u32::MAX
                .checked_shl(32 - u32::from(n.prefix_len()))
                .unwrap_or(0);
            (u32::from(n.addr()) & mask) == (u32::from(*a) & mask)
        }
        (IpNet::V6(n), IpAddr::V6(a)) => {
            let mask = u128::MAX
                .checked_shl(128 - u32::from(n.prefix_len()))
                .unwrap_or(0);
            (u128::from(n.addr()) & mask) == (u128::from(*a) & mask)
        }
        _ => false,
    }
}

/// Whether `net` is a single host (/32 or /128).
pub fn is_single_host(net: &IpNet) -> bool {
    net.prefix_len() == max_prefix(&net.addr())
}

fn max_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Decide whether a query is an IP literal.
///
/// A trailing `/prefix` is accepted, matching how lookups accept entries
/// copied straight out of a list file, but only when it is a valid prefix
/// for the address family.
pub fn query_address(query: &str) -> Option<IpAddr> {
    let query = query.trim();
    if query.contains('/') {
        parse_cidr(query).ok().map(|net| net.addr())
    } else {
        query.parse().ok()
    }
}

/// Normalize and validate a domain or wildcard domain pattern.
///
/// Lowercases, strips a trailing root dot, and checks that every label is
/// non-empty and made of letters, digits, `-` or `_`. A single leading `*.`
/// is accepted.
pub fn normalize_domain(s: &str) -> Result<String> {
    let lowered = s.trim().trim_end_matches('.').to_ascii_lowercase();
    if lowered.is_empty() {
        return Err(PangrosanError::parse("Empty domain"));
    }

    let body = lowered.strip_prefix("*.").unwrap_or(&lowered);
    let valid = !body.is_empty()
        && body.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });

    if !valid {
        return Err(PangrosanError::parse(format!("Invalid domain: {}", s)));
    }
    Ok(lowered)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    proptest! {
        /// IPv4 containment agrees with comparing the top prefix bits
        #[test]
        fn prop_contains_v4_top_bits(base in any::<u32>(), addr in any::<u32>(), prefix in 0u8..=32) {
            let net = IpNet::new(IpAddr::V4(Ipv4Addr::from(base)), prefix).unwrap();
            let shift = 32 - u32::from(prefix);
            let expected = (u64::from(base) >> shift) == (u64::from(addr) >> shift);
            prop_assert_eq!(contains(&net, &IpAddr::V4(Ipv4Addr::from(addr))), expected);
        }

        /// IPv6 containment agrees with comparing the top prefix bits
        #[test]
        fn prop_contains_v6_top_bits(base in any::<u128>(), addr in any::<u128>(), prefix in 0u8..=128) {
            let net = IpNet::new(IpAddr::V6(Ipv6Addr::from(base)), prefix).unwrap();
            let shift = 128 - u32::from(prefix);
            let expected = base.checked_shr(shift).unwrap_or(0) == addr.checked_shr(shift).unwrap_or(0);
            prop_assert_eq!(contains(&net, &IpAddr::V6(Ipv6Addr::from(addr))), expected);
        }

        /// A network always contains its own base address
        #[test]
        fn prop_contains_own_base(base in any::<u32>(), prefix in 0u8..=32) {
            let ip = IpAddr::V4(Ipv4Addr::from(base));
            let net = IpNet::new(ip, prefix).unwrap();
            prop_assert!(contains(&net, &ip));
        }

        /// Families never cross
        #[test]
        fn prop_family_mismatch(v4 in any::<u32>(), v6 in any::<u128>(), p4 in 0u8..=32, p6 in 0u8..=128) {
            let net4 = IpNet::new(IpAddr::V4(Ipv4Addr::from(v4)), p4).unwrap();
            let net6 = IpNet::new(IpAddr::V6(Ipv6Addr::from(v6)), p6).unwrap();
            prop_assert!(!contains(&net4, &IpAddr::V6(Ipv6Addr::from(v6))));
            prop_assert!(!contains(&net6, &IpAddr::V4(Ipv4Addr::from(v4))));
        }
    }
}
