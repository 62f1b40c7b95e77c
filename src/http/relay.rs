//! The relay: forwards everything under the path prefix to the upstream.
//!
//! # Data Flow
//! ```text
//! inbound request (ANY <prefix>/*)
//!     → read body (skipped for GET/HEAD, bounded by limits.max_body_size)
//!     → ForwardedRequest: prefix stripped, rebased on upstream base,
//!       raw query kept, host + framing headers dropped, credential defaulted
//!     → single upstream call (no retries)
//!     → 2xx/3xx: status + headers copied, body streamed back unchanged
//!     → 4xx/5xx or failure: RelayError (see response.rs)
//! ```

use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Request},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;

use crate::config::validation::{is_valid_path_prefix, ValidationError};
use crate::config::RelayConfig;
use crate::http::request::RequestIdExt;
use crate::http::response::{parse_details, RelayError};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Immutable relay settings derived from [`RelayConfig`] once at startup.
#[derive(Debug, Clone)]
pub struct Relay {
    base_url: String,
    path_prefix: String,
    credential_header: HeaderName,
    default_credential: HeaderValue,
    max_body_size: usize,
}

/// One upstream call, built per inbound request and consumed by [`send`](Self::send).
#[derive(Debug)]
pub struct ForwardedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Relay {
    pub fn from_config(config: &RelayConfig) -> Result<Self, ValidationError> {
        let upstream = &config.upstream;
        if !is_valid_path_prefix(&upstream.path_prefix) {
            return Err(ValidationError::InvalidPathPrefix(upstream.path_prefix.clone()));
        }
        let credential_header = HeaderName::from_bytes(upstream.credential_header.as_bytes())
            .map_err(|_| ValidationError::InvalidCredentialHeader(upstream.credential_header.clone()))?;
        let default_credential =
            HeaderValue::from_str(&upstream.api_key).map_err(|_| ValidationError::InvalidApiKey)?;

        Ok(Self {
            base_url: upstream.base_url.trim_end_matches('/').to_string(),
            path_prefix: upstream.path_prefix.clone(),
            credential_header,
            default_credential,
            max_body_size: config.limits.max_body_size,
        })
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Inbound path with the prefix and any leading slash removed.
    pub fn upstream_path<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.path_prefix.as_str())
            .unwrap_or(path)
            .trim_start_matches('/')
    }

    /// `<base>/<path>[?<query>]`. The raw query string is appended once, untouched.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        let path = self.upstream_path(path);
        match query.filter(|q| !q.is_empty()) {
            Some(q) => format!("{}/{}?{}", self.base_url, path, q),
            None => format!("{}/{}", self.base_url, path),
        }
    }

    /// Copy inbound headers for the upstream call.
    ///
    /// `host` belongs to this hop; `content-length` and `transfer-encoding`
    /// are recomputed by the client for the re-sent body. The credential is
    /// filled only when absent; an empty value counts as absent.
    pub fn forward_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut headers = inbound.clone();
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);

        let absent = headers
            .get(&self.credential_header)
            .map_or(true, HeaderValue::is_empty);
        if absent {
            headers.insert(self.credential_header.clone(), self.default_credential.clone());
        }
        headers
    }

    /// Build the upstream call for an inbound request.
    pub fn prepare(&self, parts: &Parts, body: Option<Bytes>) -> ForwardedRequest {
        ForwardedRequest {
            method: parts.method.clone(),
            url: self.upstream_url(parts.uri.path(), parts.uri.query()),
            headers: self.forward_headers(&parts.headers),
            body: body.filter(|_| carries_body(&parts.method)),
        }
    }
}

/// Read-only methods are forwarded without a body.
pub fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

impl ForwardedRequest {
    /// Issue the upstream call. Redirect handling is the client's policy.
    pub async fn send(self, client: &reqwest::Client) -> Result<reqwest::Response, RelayError> {
        let url = reqwest::Url::parse(&self.url)
            .map_err(|_| RelayError::InvalidUpstream(self.url.clone()))?;

        let mut builder = client.request(self.method, url).headers(self.headers);
        if let Some(body) = self.body {
            builder = builder.body(body);
        }

        builder.send().await.map_err(|e| RelayError::unreachable(&e))
    }
}

/// Buffer the inbound body, failing once it grows past `limit` bytes.
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, RelayError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| RelayError::BodyRead(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(RelayError::BodyTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buf))
}

/// Read at most `limit` bytes of an upstream error body; the rest is dropped.
async fn read_error_body(upstream: reqwest::Response, limit: usize) -> Result<Bytes, RelayError> {
    let mut stream = upstream.bytes_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| RelayError::unreachable(&e))?;
        let room = limit - buf.len();
        if chunk.len() >= room {
            buf.extend_from_slice(&chunk[..room]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buf))
}

/// Turn the upstream response into ours. Error payloads are capped at
/// `error_body_limit` bytes.
pub async fn relay_response(
    upstream: reqwest::Response,
    error_body_limit: usize,
) -> Result<Response, RelayError> {
    let status = upstream.status();
    let headers = upstream.headers().clone();

    if status.is_client_error() || status.is_server_error() {
        let body = read_error_body(upstream, error_body_limit).await?;
        return Err(RelayError::UpstreamStatus {
            status,
            headers,
            details: parse_details(&body),
        });
    }

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

async fn relay(state: &AppState, request: Request<Body>) -> Result<Response, RelayError> {
    let (parts, body) = request.into_parts();

    let body = if carries_body(&parts.method) {
        Some(read_body(body, state.relay.max_body_size()).await?)
    } else {
        None
    };

    let forwarded = state.relay.prepare(&parts, body);
    tracing::debug!(
        method = %forwarded.method,
        upstream = %forwarded.url,
        "Relaying request"
    );

    let upstream = forwarded.send(&state.client).await?;
    relay_response(upstream, state.relay.max_body_size()).await
}

/// `ANY <prefix>/*`.
pub async fn relay_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request.request_id().to_owned();
    let method = request.method().clone();

    let response = match relay(&state, request).await {
        Ok(response) => response,
        Err(err) => {
            metrics::record_upstream_error(err.kind());
            match &err {
                RelayError::UpstreamStatus { status, .. } => {
                    tracing::warn!(request_id = %request_id, status = %status, "Upstream returned error status")
                }
                _ => tracing::error!(request_id = %request_id, error = %err, "Relay error"),
            }
            err.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
