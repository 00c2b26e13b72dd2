//! SSRF guard for URLs supplied by callers or returned by the upstream.

use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// True for public http(s) targets; false for anything unparsable, non-http(s), loopback,
/// or inside the RFC 1918 private ranges.
///
/// Only IP literals are range-checked: a hostname is never matched by prefix, so
/// `https://10.example.com/` is safe.
pub fn is_safe(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(u) => is_safe_url(&u),
        Err(_) => false,
    }
}

pub fn is_safe_url(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        None => false,
        Some(Host::Domain(d)) => !is_local_name(d),
        Some(Host::Ipv4(ip)) => !is_blocked_v4(ip),
        Some(Host::Ipv6(ip)) => !is_blocked_v6(ip),
    }
}

fn is_local_name(host: &str) -> bool {
    host.trim_end_matches('.').eq_ignore_ascii_case("localhost")
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    // 10/8, 172.16/12, 192.168/16 plus loopback.
    ip.is_loopback() || ip.is_private()
}

fn is_blocked_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() {
        return true;
    }
    // ::ffff:a.b.c.d reaches the same IPv4 host.
    match ip.to_ipv4_mapped() {
        Some(v4) => is_blocked_v4(v4),
        None => false,
    }
}
