//! Origin allow-list
//!
//! - `localhost` / `127.0.0.1` origins (any scheme, any port) are always allowed
//! - production origins come from [`Config::allowed_origins`](crate::core::Config)
//! - any other `Origin` gets `403 Forbidden`
//! - requests without an `Origin` header (same-host tools, Electron) pass
//! - `OPTIONS` never reaches the routes: preflights are answered by
//!   [`CorsLayer`], bare `OPTIONS` by the guard, both with 200

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{HeaderValue, Method, StatusCode, Uri, header};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::warn;

use crate::utils::AppError;

/// Hosts allowed regardless of configuration
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

/// Origin policy built from configuration
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new(allowed: &[String]) -> Self {
        Self {
            allowed: allowed
                .iter()
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .collect(),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim().trim_end_matches('/');

        if let Ok(uri) = origin.parse::<Uri>()
            && let Some(host) = uri.host()
            && uri.scheme().is_some()
            && LOCAL_HOSTS.iter().any(|h| host.eq_ignore_ascii_case(h))
        {
            return true;
        }

        self.allowed.iter().any(|o| o.eq_ignore_ascii_case(origin))
    }

    /// tower-http layer emitting the CORS response headers
    pub fn layer(self: &Arc<Self>) -> CorsLayer {
        let policy = Arc::clone(self);
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
                origin.to_str().is_ok_and(|o| policy.is_allowed(o))
            }))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(AllowHeaders::mirror_request())
    }
}

/// Reject disallowed origins and short-circuit bare `OPTIONS`
pub async fn cors_guard(
    State(policy): State<Arc<OriginPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(origin) = req.headers().get(header::ORIGIN) {
        let allowed = origin.to_str().is_ok_and(|o| policy.is_allowed(o));
        if !allowed {
            warn!(origin = ?origin, path = %req.uri().path(), "Origin rejected");
            return AppError::Forbidden.into_response();
        }
    }

    if req.method() == Method::OPTIONS
        && !req
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    {
        return StatusCode::OK.into_response();
    }

    next.run(req).await
}
