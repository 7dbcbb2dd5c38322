//! Address ranges for ingress whitelists.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::{fmt, net::IpAddr, str::FromStr};

/// Normalize IP address to handle IPv4-mapped IPv6 addresses
///
/// Converts IPv4-mapped IPv6 addresses (e.g., `::ffff:192.168.1.1`) to their
/// plain IPv4 form so the same client is matched consistently.
///
/// ```
/// use turnstile::security::normalize_ip;
///
/// assert_eq!(normalize_ip("::ffff:192.168.1.1").unwrap().to_string(), "192.168.1.1");
/// assert!(normalize_ip("not an address").is_none());
/// ```
pub fn normalize_ip(address: &str) -> Option<IpAddr> {
    match address.trim().parse::<IpAddr>().ok()? {
        IpAddr::V6(v6) => Some(
            v6.to_ipv4_mapped()
                .map_or(IpAddr::V6(v6), IpAddr::V4),
        ),
        v4 => Some(v4),
    }
}

/// Whether an address names the local host
pub fn is_loopback(address: &str) -> bool {
    let address = address.trim();
    address.eq_ignore_ascii_case("localhost")
        || normalize_ip(address).is_some_and(|ip| ip.is_loopback())
}

/// A whitelist entry
///
/// Parsed from a CIDR block (`10.0.0.0/8`), a single address (`192.168.1.7`)
/// or an inclusive span (`192.168.1.10-192.168.1.20`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IpRange {
    Network(IpNetwork),
    Span { start: IpAddr, end: IpAddr },
}

impl IpRange {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match self {
            IpRange::Network(network) => network.contains(ip),
            IpRange::Span { start, end } => {
                start.is_ipv4() == ip.is_ipv4() && *start <= ip && ip <= *end
            }
        }
    }

    /// Whether any range in `ranges` contains `ip`
    pub fn any_contains(ranges: &[IpRange], ip: IpAddr) -> bool {
        ranges.iter().any(|range| range.contains(ip))
    }
}

impl FromStr for IpRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((start, end)) = s.split_once('-') {
            let start = normalize_ip(start).ok_or_else(|| format!("invalid range start: {s}"))?;
            let end = normalize_ip(end).ok_or_else(|| format!("invalid range end: {s}"))?;
            if start.is_ipv4() != end.is_ipv4() {
                return Err(format!("mixed address families in range: {s}"));
            }
            if start > end {
                return Err(format!("range start after end: {s}"));
            }
            return Ok(IpRange::Span { start, end });
        }

        if s.contains('/') {
            return s
                .parse::<IpNetwork>()
                .map(IpRange::Network)
                .map_err(|e| format!("invalid network {s}: {e}"));
        }

        let ip = normalize_ip(s).ok_or_else(|| format!("invalid address: {s}"))?;
        let prefix = if ip.is_ipv4() { 32 } else { 128 };
        IpNetwork::new(ip, prefix)
            .map(IpRange::Network)
            .map_err(|e| format!("invalid address {s}: {e}"))
    }
}

impl TryFrom<String> for IpRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IpRange> for String {
    fn from(range: IpRange) -> Self {
        range.to_string()
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpRange::Network(network) => write!(f, "{network}"),
            IpRange::Span { start, end } => write!(f, "{start}-{end}"),
        }
    }
}
