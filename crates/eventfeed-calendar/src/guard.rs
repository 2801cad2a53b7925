//! Outbound URL guard for the calendar fetcher.
//!
//! Only `http`/`https` URLs pass. The host is resolved and every address must be
//! publicly routable, so a configured feed URL cannot be pointed at loopback,
//! private, link-local or reserved targets.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use thiserror::Error;
use tokio::net::lookup_host;
use url::Url;

/// Which targets the guard lets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SsrfPolicy {
    /// Allows loopback/private/link-local targets when true.
    pub allow_private_network: bool,
}

/// Rejected URL, with a stable reason code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{detail} ({reason_code})")]
pub struct SsrfViolation {
    pub reason_code: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct SsrfGuard {
    policy: SsrfPolicy,
}

impl SsrfGuard {
    pub fn new(policy: SsrfPolicy) -> Self {
        Self { policy }
    }

    /// Parses and validates a URL.
    pub async fn parse_and_validate_url(&self, raw_url: &str) -> Result<Url, SsrfViolation> {
        let url = parse_url(raw_url)?;
        self.validate_url(&url).await?;
        Ok(url)
    }

    /// Validates a parsed URL, resolving its host when it is not an IP literal.
    pub async fn validate_url(&self, url: &Url) -> Result<(), SsrfViolation> {
        if self.validate_without_dns(url)? {
            return Ok(());
        }
        let host = normalized_host(url)?;

        let port = url.port_or_known_default().ok_or_else(|| {
            violation(
                "invalid_url",
                format!("URL '{}' does not include a known default port", url),
            )
        })?;
        let lookup_target = format!("{host}:{port}");
        let addresses = lookup_host(lookup_target.as_str()).await.map_err(|error| {
            violation(
                "dns_resolution_failed",
                format!("failed DNS resolution for host '{host}': {error}"),
            )
        })?;

        let mut resolved_any = false;
        for socket_addr in addresses {
            resolved_any = true;
            validate_ip(socket_addr.ip(), self.policy.allow_private_network)?;
        }
        if !resolved_any {
            return Err(violation(
                "dns_resolution_failed",
                format!("host '{host}' resolved no addresses"),
            ));
        }
        Ok(())
    }

    /// Checks everything that does not need DNS: scheme, host names and IP literals.
    ///
    /// Returns `true` when the host was an IP literal and is fully validated.
    fn validate_without_dns(&self, url: &Url) -> Result<bool, SsrfViolation> {
        validate_scheme(url)?;
        let host = normalized_host(url)?;
        if is_metadata_hostname(&host) {
            return Err(violation(
                "blocked_metadata_endpoint",
                format!("blocked metadata hostname '{}'", host),
            ));
        }
        if is_localhost_hostname(&host) && !self.policy.allow_private_network {
            return Err(violation(
                "blocked_private_network",
                format!("blocked localhost hostname '{}'", host),
            ));
        }

        // IPv6 literals come back bracketed from `host_str`.
        let literal = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip_addr) = literal.parse::<IpAddr>() {
            validate_ip(ip_addr, self.policy.allow_private_network)?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// DNS resolver for the HTTP client that refuses hosts with a blocked address.
///
/// The client connects only to addresses this resolver hands out, so a name
/// that re-resolves to a private target after [`SsrfGuard::validate_url`]
/// passed it still cannot be reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardedResolver {
    policy: SsrfPolicy,
}

impl GuardedResolver {
    pub fn new(policy: SsrfPolicy) -> Self {
        Self { policy }
    }

    /// Resolve `host` and check every address.
    pub async fn lookup(&self, host: &str) -> Result<Vec<SocketAddr>, SsrfViolation> {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if is_metadata_hostname(&host) {
            return Err(violation(
                "blocked_metadata_endpoint",
                format!("blocked metadata hostname '{}'", host),
            ));
        }
        if is_localhost_hostname(&host) && !self.policy.allow_private_network {
            return Err(violation(
                "blocked_private_network",
                format!("blocked localhost hostname '{}'", host),
            ));
        }

        let addresses: Vec<SocketAddr> = lookup_host((host.as_str(), 0))
            .await
            .map_err(|error| {
                violation(
                    "dns_resolution_failed",
                    format!("failed DNS resolution for host '{host}': {error}"),
                )
            })?
            .collect();
        if addresses.is_empty() {
            return Err(violation(
                "dns_resolution_failed",
                format!("host '{host}' resolved no addresses"),
            ));
        }
        for address in &addresses {
            validate_ip(address.ip(), self.policy.allow_private_network)?;
        }
        Ok(addresses)
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = *self;
        Box::pin(async move {
            let addresses = resolver.lookup(name.as_str()).await?;
            let addrs: Addrs = Box::new(addresses.into_iter());
            Ok(addrs)
        })
    }
}

/// Parse a URL and check its scheme without touching the network.
pub fn parse_url(raw_url: &str) -> Result<Url, SsrfViolation> {
    let url = Url::parse(raw_url.trim())
        .map_err(|error| violation("invalid_url", format!("invalid URL '{raw_url}': {error}")))?;
    validate_scheme(&url)?;
    normalized_host(&url)?;
    Ok(url)
}

fn violation(reason_code: &'static str, detail: String) -> SsrfViolation {
    SsrfViolation {
        reason_code,
        detail,
    }
}

fn validate_scheme(url: &Url) -> Result<(), SsrfViolation> {
    match url.scheme() {
        "https" | "http" => Ok(()),
        scheme => Err(violation(
            "blocked_scheme",
            format!("unsupported scheme '{scheme}' for URL '{}'", url),
        )),
    }
}

fn normalized_host(url: &Url) -> Result<String, SsrfViolation> {
    let host = url
        .host_str()
        .ok_or_else(|| violation("invalid_url", format!("URL '{}' is missing a host", url)))?;
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return Err(violation(
            "invalid_url",
            format!("URL '{}' resolved to an empty host", url),
        ));
    }
    Ok(host)
}

fn is_localhost_hostname(host: &str) -> bool {
    host == "localhost" || host.ends_with(".localhost")
}

fn is_metadata_hostname(host: &str) -> bool {
    matches!(
        host,
        "metadata" | "metadata.google.internal" | "instance-data" | "metadata.azure.internal"
    )
}

fn validate_ip(ip_addr: IpAddr, allow_private_network: bool) -> Result<(), SsrfViolation> {
    // Judge IPv4-mapped IPv6 addresses by their embedded IPv4 address.
    let ip_addr = match ip_addr {
        IpAddr::V6(ipv6) => ipv6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(ipv6)),
        v4 => v4,
    };

    if is_metadata_ip(ip_addr) {
        return Err(violation(
            "blocked_metadata_endpoint",
            format!("blocked metadata IP '{}'", ip_addr),
        ));
    }
    if ip_addr.is_unspecified() {
        return Err(violation(
            "blocked_unspecified_ip",
            format!("blocked unspecified IP '{}'", ip_addr),
        ));
    }
    if ip_addr.is_multicast() {
        return Err(violation(
            "blocked_multicast",
            format!("blocked multicast IP '{}'", ip_addr),
        ));
    }
    if is_reserved_ip(ip_addr) {
        return Err(violation(
            "blocked_reserved",
            format!("blocked reserved IP '{}'", ip_addr),
        ));
    }
    if !allow_private_network && is_private_network_ip(ip_addr) {
        return Err(violation(
            "blocked_private_network",
            format!("blocked private or loopback IP '{}'", ip_addr),
        ));
    }
    Ok(())
}

fn is_metadata_ip(ip_addr: IpAddr) -> bool {
    matches!(ip_addr, IpAddr::V4(ipv4) if ipv4 == Ipv4Addr::new(169, 254, 169, 254))
}

fn is_private_network_ip(ip_addr: IpAddr) -> bool {
    match ip_addr {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || is_ipv4_carrier_grade_nat(ipv4)
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback() || is_ipv6_unique_local(ipv6) || is_ipv6_link_local(ipv6)
        }
    }
}

fn is_reserved_ip(ip_addr: IpAddr) -> bool {
    match ip_addr {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_broadcast()
                || ipv4.is_documentation()
                // 0.0.0.0/8 "this network"
                || octets[0] == 0
                // 240.0.0.0/4 future use
                || octets[0] >= 240
                // 198.18.0.0/15 benchmarking
                || (octets[0] == 198 && (octets[1] & 0xfe) == 18)
                // 192.0.0.0/24 protocol assignments
                || (octets[0] == 192 && octets[1] == 0 && octets[2] == 0)
        }
        IpAddr::V6(ipv6) => is_ipv6_documentation(ipv6),
    }
}

fn is_ipv4_carrier_grade_nat(ipv4: Ipv4Addr) -> bool {
    let octets = ipv4.octets();
    octets[0] == 100 && (64..=127).contains(&octets[1])
}

fn is_ipv6_unique_local(ipv6: Ipv6Addr) -> bool {
    (ipv6.segments()[0] & 0xfe00) == 0xfc00
}

fn is_ipv6_link_local(ipv6: Ipv6Addr) -> bool {
    (ipv6.segments()[0] & 0xffc0) == 0xfe80
}

fn is_ipv6_documentation(ipv6: Ipv6Addr) -> bool {
    ipv6.segments()[0] == 0x2001 && ipv6.segments()[1] == 0x0db8
}
