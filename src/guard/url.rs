use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::{GuardRejection, GuardResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct UrlGuardConfig {
    /// Permits loopback/link-local/private hosts. Only ever set for tests
    /// exercising fixtures on `127.0.0.1`.
    pub allow_private_network_targets: bool,
}

fn is_blocked_ipv4(addr: Ipv4Addr) -> bool {
    addr.is_loopback() || addr.is_private() || addr.is_link_local() || addr.is_unspecified()
}

fn is_blocked_ipv6(addr: Ipv6Addr) -> bool {
    if addr.is_loopback() || addr.is_unspecified() {
        return true;
    }
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }
    let segments = addr.segments();
    // fc00::/7 unique local, fe80::/10 link-local.
    (segments[0] & 0xfe00) == 0xfc00 || (segments[0] & 0xffc0) == 0xfe80
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

/// Validates scheme (`http`/`https` only) and resolves the host to check it
/// does not land in a loopback/private/link-local range, unless explicitly
/// bypassed. Callers must re-invoke this on every redirect hop.
pub async fn validate_url(url: &url::Url, config: &UrlGuardConfig) -> GuardResult<()> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(GuardRejection::UrlSchemeNotAllowed);
    }

    let host = url.host_str().ok_or(GuardRejection::UrlUnparsable)?;

    if config.allow_private_network_targets {
        return Ok(());
    }

    // A literal IP host needs no DNS resolution.
    if let Ok(ip) = host.parse::<IpAddr>() {
        return if is_blocked_ip(ip) {
            Err(GuardRejection::UrlHostBlocked)
        } else {
            Ok(())
        };
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| GuardRejection::UrlUnparsable)?;

    let mut any_resolved = false;
    for addr in addrs {
        any_resolved = true;
        if is_blocked_ip(addr.ip()) {
            return Err(GuardRejection::UrlHostBlocked);
        }
    }

    if !any_resolved {
        return Err(GuardRejection::UrlUnparsable);
    }

    Ok(())
}
