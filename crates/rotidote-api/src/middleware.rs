//! HTTP middleware: rate limiting, CORS, security headers, request ids and access logs.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn, Span};
use uuid::Uuid;

use crate::error::{ApiError, ErrorResponse};
use crate::metrics;
use crate::state::AppState;

/// Tracked client IPs before idle entries are swept.
const SWEEP_THRESHOLD: usize = 10_000;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Paths kept out of the access log.
const QUIET_PATHS: [&str; 3] = ["/health", "/ready", "/metrics"];

/// Helmet's default header set.
const SECURITY_HEADERS: [(&str, &str); 12] = [
    ("content-security-policy", "default-src 'self'; frame-ancestors 'self'; object-src 'none'"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "DENY"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Per-client request budget: `max_requests` per window, refilled evenly.
///
/// Clients are keyed by socket peer unless `trust_proxy` is set, in which case
/// forwarding headers win.
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    trust_proxy: bool,
}

impl ClientRateLimiter {
    pub fn new(max_requests: u32, window: Duration, trust_proxy: bool) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota),
            trust_proxy,
        }
    }

    /// Spend one request from `ip`'s budget. False when it is exhausted.
    pub fn check(&self, ip: IpAddr) -> bool {
        if self.limiter.len() >= SWEEP_THRESHOLD {
            self.limiter.retain_recent();
            self.limiter.shrink_to_fit();
            debug!(tracked = self.limiter.len(), "Swept idle rate limiter entries");
        }
        self.limiter.check_key(&ip).is_ok()
    }
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().max_age(Duration::from_secs(600));

    if origins.iter().any(|o| o == "*") {
        return layer
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any);
    }

    // Credentials cannot be combined with wildcard headers
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .expose_headers([header::CONTENT_LENGTH, HeaderName::from_static(REQUEST_ID_HEADER)])
}

pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    response
}

/// Request id carried in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Reuse the caller's `X-Request-ID` when it looks sane, else mint one, and echo it back.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| (1..=128).contains(&s.len()))
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);

    Span::current().record("request_id", id.as_str());
    let echo = HeaderValue::from_str(&id).ok();
    request.extensions_mut().insert(RequestId(id));

    let mut response = next.run(request).await;
    if let Some(value) = echo {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    if !QUIET_PATHS.contains(&uri.path()) {
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(%method, %uri, status = response.status().as_u16(), duration_ms, "Request completed");
    }
    response
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<ClientRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    match client_ip(&request, limiter.trust_proxy) {
        Some(ip) if !limiter.check(ip) => {
            warn!(%ip, path = request.uri().path(), "Rate limit exceeded");
            metrics::record_rate_limit_hit(request.uri().path());
            ApiError::RateLimited.into_response()
        }
        _ => next.run(request).await,
    }
}

/// Hide the details of 5xx error bodies in production.
pub async fn redact_server_errors(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let response = next.run(request).await;
    if !state.config.is_production() || !response.status().is_server_error() {
        return response;
    }
    match response.extensions().get::<ErrorResponse>() {
        Some(body) if body.details.is_some() => body.redacted().into_response_with(response.status()),
        _ => response,
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let raw = headers.get(name)?.to_str().ok()?;
    // Proxies append, so the first hop is the client
    raw.split(',').next()?.trim().parse().ok()
}

/// Client address. With `trust_proxy`: `X-Forwarded-For`, then `X-Real-IP`,
/// then the socket peer. Without it the headers are ignored.
fn client_ip(request: &Request<Body>, trust_proxy: bool) -> Option<IpAddr> {
    let peer = || {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };
    if !trust_proxy {
        return peer();
    }
    header_ip(request.headers(), "x-forwarded-for")
        .or_else(|| header_ip(request.headers(), "x-real-ip"))
        .or_else(peer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_budget_is_per_client() {
        let limiter = ClientRateLimiter::new(3, Duration::from_secs(900), false);

        for _ in 0..3 {
            assert!(limiter.check(ip("203.0.113.7")));
        }
        assert!(!limiter.check(ip("203.0.113.7")));
        assert!(limiter.check(ip("203.0.113.8")));
    }

    #[test]
    fn test_zero_budget_still_allows_one() {
        let limiter = ClientRateLimiter::new(0, Duration::from_secs(60), false);
        assert!(limiter.check(ip("192.0.2.1")));
        assert!(!limiter.check(ip("192.0.2.1")));
    }

    fn peer(request: &mut Request<Body>, addr: [u8; 4]) {
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((addr, 4000))));
    }

    #[test]
    fn test_client_ip_ignores_headers_by_default() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "198.51.100.4")
            .header("x-real-ip", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request, false), None);

        peer(&mut request, [203, 0, 113, 5]);
        assert_eq!(client_ip(&request, false), Some(ip("203.0.113.5")));
    }

    #[test]
    fn test_client_ip_precedence_behind_proxy() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
            .header("x-real-ip", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        peer(&mut request, [127, 0, 0, 1]);
        assert_eq!(client_ip(&request, true), Some(ip("198.51.100.4")));

        let mut request = Request::builder()
            .header("x-forwarded-for", "garbage")
            .header("x-real-ip", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        peer(&mut request, [127, 0, 0, 1]);
        assert_eq!(client_ip(&request, true), Some(ip("10.0.0.2")));

        let mut request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&request, true), None);

        peer(&mut request, [127, 0, 0, 1]);
        assert_eq!(client_ip(&request, true), Some(ip("127.0.0.1")));
    }
}
