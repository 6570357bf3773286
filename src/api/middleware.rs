/// Request metadata helpers shared by the middleware and handlers
use crate::{auth::ClientInfo, context::AppContext, error::ApiError};
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, Extensions, HeaderMap},
};
use std::net::SocketAddr;

const UNKNOWN_CLIENT: &str = "unknown";

/// Best-effort client address.
///
/// The first `X-Forwarded-For` entry wins when the deployment trusts it,
/// then the socket peer, then a fixed placeholder.
pub fn client_addr(headers: &HeaderMap, extensions: &Extensions, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(addr) = forwarded {
            return addr.to_string();
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl FromRequestParts<AppContext> for ClientInfo {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo {
            addr: client_addr(
                &parts.headers,
                &parts.extensions,
                state.config.service.trust_forwarded_for,
            ),
            agent: user_agent(&parts.headers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );

        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 5], 4000))));

        assert_eq!(client_addr(&headers, &extensions, true), "203.0.113.9");
        assert_eq!(client_addr(&headers, &extensions, false), "192.168.1.5");
    }

    #[test]
    fn test_unknown_client_placeholder() {
        let headers = HeaderMap::new();
        let extensions = Extensions::new();

        assert_eq!(client_addr(&headers, &extensions, true), UNKNOWN_CLIENT);
        assert_eq!(user_agent(&headers), "");
    }
}
