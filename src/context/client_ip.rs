use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnetwork::IpNetwork;
use thiserror::Error;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid trusted proxy '{0}'")]
pub struct InvalidProxy(pub String);

/// Reverse proxies allowed to report the client address in `X-Forwarded-For`.
///
/// Without any entry the header is ignored and the socket peer is the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies {
    networks: Vec<IpNetwork>,
}

impl TrustedProxies {
    pub fn new(networks: Vec<IpNetwork>) -> Self {
        Self { networks }
    }

    /// `10.0.0.0/8` or a bare address.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, InvalidProxy> {
        let networks = entries
            .iter()
            .map(|entry| {
                let entry = entry.as_ref().trim();
                let parsed = if entry.contains('/') {
                    entry.parse::<IpNetwork>().ok()
                } else {
                    entry.parse::<IpAddr>().ok().map(IpNetwork::from)
                };
                parsed.ok_or_else(|| InvalidProxy(entry.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { networks })
    }

    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(ip))
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Client address for a request that arrived from `peer`.
    ///
    /// The forwarding header is only read when `peer` is trusted. Hops are
    /// walked right to left and the first untrusted one is the client. A hop
    /// that does not parse makes the address unknown.
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
        let peer = peer?;
        if !self.is_trusted(peer) {
            return Some(peer);
        }

        let hops: Vec<&str> = headers
            .get_all(FORWARDED_FOR_HEADER)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .collect();

        let mut client = peer;
        for hop in hops.into_iter().rev() {
            let Ok(ip) = hop.parse::<IpAddr>() else {
                tracing::warn!(hop, "unparsable forwarded-for hop");
                return None;
            };
            client = ip;
            if !self.is_trusted(ip) {
                break;
            }
        }
        Some(client)
    }
}
