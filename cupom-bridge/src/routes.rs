use std::sync::Arc;

use axum::Router;
use axum::middleware as axum_middleware;
use http::{HeaderName, HeaderValue};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::api;
use crate::core::ServerState;
use crate::middleware::{OriginPolicy, cors_guard, logging_middleware};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// All routes, no middleware, no state
pub fn build_router() -> Router<ServerState> {
    Router::new()
        // Print API
        .merge(api::print::router())
        // Printer listing
        .merge(api::printers::router())
        // Health API
        .merge(api::health::router())
}

/// Fully configured application, used by the server and by oneshot tests
pub fn build_app(state: ServerState) -> Router {
    let policy = Arc::new(OriginPolicy::new(&state.config.allowed_origins));

    build_router()
        .with_state(state)
        // CORS response headers and preflight answers
        .layer(policy.layer())
        // Origin allow-list, runs before the CORS layer
        .layer(axum_middleware::from_fn_with_state(policy, cors_guard))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        // Outermost so every inner layer sees the id
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            XRequestId,
        ))
}
