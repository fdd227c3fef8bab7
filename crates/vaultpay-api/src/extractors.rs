//! Custom extractors

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use std::net::SocketAddr;

use crate::error::ApiError;

// =============================================================================
// Client IP Extractor
// =============================================================================

/// Client address: proxy headers first, then the connection's peer address
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(client_ip(&parts.headers, peer)))
    }
}

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    header("CF-Connecting-IP")
        .or_else(|| header("X-Real-IP"))
        .or_else(|| header("X-Forwarded-For"))
        .or_else(|| peer.map(|a| a.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

// =============================================================================
// Bearer Token Extractor
// =============================================================================

/// Token from an `Authorization: Bearer <token>` header
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty())
            .map(|token| BearerToken(token.to_string()))
            .ok_or(ApiError::MissingAuthorization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "192.168.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), "192.168.0.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("X-Forwarded-For", "1.2.3.4, 5.6.7.8".parse().unwrap());
        assert_eq!(client_ip(&headers, Some(peer)), "1.2.3.4");

        headers.insert("X-Real-IP", "10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, None), "10.0.0.1");

        headers.insert("CF-Connecting-IP", "172.16.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, None), "172.16.0.1");
    }
}
