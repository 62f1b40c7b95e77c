//! Cross-origin policy.
//!
//! Preflight requests (OPTIONS carrying `Origin` and
//! `Access-Control-Request-Method`) are answered by the CORS layer and never
//! reach the relay. `CorsLayer` treats every OPTIONS as a preflight, so plain
//! OPTIONS requests are steered around it and forwarded like any other method.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::Response,
    Router,
};
use tower::ServiceExt;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// Build the CORS layer. An empty origin list allows any origin.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .allowed_headers
        .iter()
        .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
}

/// True for a CORS preflight as opposed to a plain OPTIONS request.
pub fn is_preflight<B>(req: &Request<B>) -> bool {
    req.method() == Method::OPTIONS
        && req.headers().contains_key(header::ORIGIN)
        && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// `Access-Control-Allow-Origin` for `origin` under `config`, if allowed.
pub fn allowed_origin(config: &CorsConfig, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
    if config.allowed_origins.is_empty() {
        return Some(HeaderValue::from_static("*"));
    }
    let origin = origin?;
    config
        .allowed_origins
        .iter()
        .any(|o| o.as_bytes() == origin.as_bytes())
        .then(|| origin.clone())
}

/// State for [`plain_options_middleware`].
#[derive(Clone)]
pub struct PlainOptions {
    /// Handler router without the CORS layer.
    pub handlers: Router,
    pub cors: Arc<CorsConfig>,
}

/// Route non-preflight OPTIONS straight to the handlers, bypassing `CorsLayer`.
pub async fn plain_options_middleware(
    State(state): State<PlainOptions>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() != Method::OPTIONS || is_preflight(&req) {
        return next.run(req).await;
    }

    let allow_origin = allowed_origin(&state.cors, req.headers().get(header::ORIGIN));
    let mut response = match state.handlers.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if let Some(value) = allow_origin {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    response
}

/// Handlers wrapped in the CORS policy, with plain OPTIONS steered around it.
pub fn with_cors(handlers: Router, config: &CorsConfig) -> Router {
    let state = PlainOptions {
        handlers: handlers.clone(),
        cors: Arc::new(config.clone()),
    };
    handlers
        .layer(cors_layer(config))
        .layer(axum::middleware::from_fn_with_state(state, plain_options_middleware))
}
