//! Client address resolution.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};

use crate::state::AppState;

/// Client address used to key per-address rate limits.
///
/// `X-Forwarded-For` is only read when the socket peer is a trusted proxy.
/// The chain is then walked from the right and the first hop that is not
/// itself a trusted proxy is the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl ClientAddr {
    /// Resolve from request headers and extensions.
    pub fn resolve(headers: &HeaderMap, extensions: &Extensions, trusted_proxies: &[IpAddr]) -> Self {
        let Some(ConnectInfo(peer)) = extensions.get::<ConnectInfo<SocketAddr>>() else {
            return Self("unknown".to_string());
        };
        let peer = peer.ip();
        if !trusted_proxies.contains(&peer) {
            return Self(peer.to_string());
        }

        let forwarded = headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>();

        let client = forwarded
            .iter()
            .rev()
            .find_map(|hop| match hop.parse::<IpAddr>() {
                Ok(ip) if trusted_proxies.contains(&ip) => None,
                Ok(ip) => Some(ip),
                // A garbled hop ends the trustworthy part of the chain.
                Err(_) => Some(peer),
            })
            .unwrap_or(peer);
        Self(client.to_string())
    }

    /// The address as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<AppState> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::resolve(
            &parts.headers,
            &parts.extensions,
            &state.config.server.trusted_proxies,
        ))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const PROXY: [u8; 4] = [10, 0, 0, 1];

    fn with_peer(ip: [u8; 4]) -> Extensions {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from((ip, 9000))));
        extensions
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_header_ignored_from_untrusted_peer() {
        let headers = forwarded("203.0.113.7");
        let resolved = ClientAddr::resolve(&headers, &with_peer([192, 0, 2, 1]), &[]);
        assert_eq!(resolved.as_str(), "192.0.2.1");
    }

    #[test]
    fn test_trusted_proxy_forwards_client() {
        let trusted = [IpAddr::from(PROXY)];
        let headers = forwarded("198.51.100.9, 203.0.113.7");
        let resolved = ClientAddr::resolve(&headers, &with_peer(PROXY), &trusted);
        // The leftmost entry is client-supplied; the proxy appended the real peer.
        assert_eq!(resolved.as_str(), "203.0.113.7");
    }

    #[test]
    fn test_chained_trusted_proxies_are_skipped() {
        let trusted = [IpAddr::from(PROXY), IpAddr::from([10, 0, 0, 2])];
        let headers = forwarded("203.0.113.7, 10.0.0.2");
        let resolved = ClientAddr::resolve(&headers, &with_peer(PROXY), &trusted);
        assert_eq!(resolved.as_str(), "203.0.113.7");
    }

    #[test]
    fn test_garbled_hop_falls_back_to_peer() {
        let trusted = [IpAddr::from(PROXY)];
        let headers = forwarded("not-an-address");
        let resolved = ClientAddr::resolve(&headers, &with_peer(PROXY), &trusted);
        assert_eq!(resolved.as_str(), "10.0.0.1");
    }

    #[test]
    fn test_unknown_without_peer() {
        let headers = forwarded("203.0.113.7");
        let resolved = ClientAddr::resolve(&headers, &Extensions::new(), &[]);
        assert_eq!(resolved.as_str(), "unknown");
    }
}
