use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::blacklist::IP_ADDRESS_MAX_LEN;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const FALLBACK_IP: &str = "0.0.0.0";

/// Originating client address of a request.
///
/// Prefers the first hop of `X-Forwarded-For` (set by load balancers), then
/// the peer address of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(client_ip(&parts.headers, peer)))
    }
}

pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let ip = match (forwarded, peer) {
        (Some(forwarded), _) => forwarded.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => FALLBACK_IP.to_string(),
    };

    // Column width of the persisted field.
    ip.chars().take(IP_ADDRESS_MAX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_first_forwarded_hop_wins() {
        let peer = "10.0.0.9:5000".parse().ok();
        let headers = forwarded(" 203.0.113.7 , 10.0.0.1, 10.0.0.2");
        assert_eq!(client_ip(&headers, peer), "203.0.113.7");
    }

    #[test]
    fn test_peer_address_without_header() {
        let peer = "10.0.0.9:5000".parse().ok();
        assert_eq!(client_ip(&HeaderMap::new(), peer), "10.0.0.9");
    }

    #[test]
    fn test_empty_header_falls_through() {
        let peer = "[::1]:8080".parse().ok();
        assert_eq!(client_ip(&forwarded(""), peer), "::1");
    }

    #[test]
    fn test_fallback_sentinel() {
        assert_eq!(client_ip(&HeaderMap::new(), None), FALLBACK_IP);
    }

    #[test]
    fn test_long_values_are_truncated() {
        let long = "a".repeat(100);
        assert_eq!(client_ip(&forwarded(&long), None).len(), IP_ADDRESS_MAX_LEN);
    }
}
