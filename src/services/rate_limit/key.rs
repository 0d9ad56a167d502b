//! Counter keys for the rate limiter.
//!
//! - IPv4 addresses are used as-is.
//! - IPv6 addresses collapse to their /56 prefix, so one subscriber allocation is one key.
//! - IPv4-mapped IPv6 (`::ffff:a.b.c.d`) is an IPv4 client.
//! - No address at all is the shared `unknown` key.

use std::net::{IpAddr, Ipv6Addr};

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ipnet::IpNet;
use sha2::{Digest, Sha256};

pub const UNKNOWN_CLIENT: &str = "unknown";
pub const IPV6_PREFIX_BITS: u8 = 56;

/// Picks the client address used for keying.
///
/// Forwarding headers are only read when the peer itself is a trusted proxy. `X-Forwarded-For`
/// is walked from the right and the first hop outside the trusted networks wins, since
/// everything left of it was written by the client. `X-Real-IP` is used only when
/// `X-Forwarded-For` is absent.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trusted_proxies: &[IpNet]) -> Option<IpAddr> {
    let peer = peer.map(|ip| ip.to_canonical());
    let is_trusted = |ip: &IpAddr| trusted_proxies.iter().any(|net| net.contains(ip));

    match peer {
        Some(ip) if is_trusted(&ip) => {}
        _ => return peer,
    }

    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        let hops: Vec<IpAddr> = forwarded
            .split(',')
            .map(|hop| hop.trim().parse::<IpAddr>().map(|ip| ip.to_canonical()))
            .collect::<Result<_, _>>()
            .unwrap_or_default();

        // An unparsable chain says nothing reliable about the client.
        return hops
            .iter()
            .rev()
            .find(|ip| !is_trusted(*ip))
            .or_else(|| hops.first())
            .copied()
            .or(peer);
    }

    header_str(headers, "x-real-ip")
        .and_then(|value| value.parse::<IpAddr>().ok())
        .map(|ip| ip.to_canonical())
        .or(peer)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn client_key(ip: Option<IpAddr>) -> String {
    match ip {
        None => UNKNOWN_CLIENT.to_string(),
        Some(IpAddr::V4(v4)) => v4.to_string(),
        Some(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => {
                let mask = !0u128 << (128 - IPV6_PREFIX_BITS);
                let masked = Ipv6Addr::from(u128::from(v6) & mask);
                format!("{masked}/{IPV6_PREFIX_BITS}")
            }
        },
    }
}

/// `<ip key>:<email digest>`. The email is trimmed and lowercased before hashing so that
/// case variants share a counter, and the address never lands in the counter store.
pub fn composite_key(ip: Option<IpAddr>, email: Option<&str>) -> String {
    let email = email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
    let digest = URL_SAFE_NO_PAD.encode(Sha256::digest(email.as_bytes()));
    format!("{}:{}", client_key(ip), digest)
}
