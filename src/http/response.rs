//! Relay error mapping.
//!
//! Every failure on the relay path ends up here and is rendered as
//! `{"error": <message>, "details": <upstream payload>}`. Upstream status
//! codes are preserved; failures with no upstream status become 500, except
//! oversized inbound bodies which are 413.

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Error produced on the relay path.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Upstream answered with a 4xx/5xx status.
    #[error("Request failed with status code {}", .status.as_u16())]
    UpstreamStatus {
        status: StatusCode,
        headers: HeaderMap,
        details: Option<Value>,
    },

    /// Upstream could not be reached, or the exchange broke mid-way.
    #[error("{0}")]
    Unreachable(String),

    /// The rebuilt upstream URL did not parse.
    #[error("Invalid upstream URL `{0}`")]
    InvalidUpstream(String),

    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Failed to read request body: {0}")]
    BodyRead(String),
}

/// JSON body of every relay error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl RelayError {
    /// Wrap a client error, keeping its whole source chain in the message.
    pub fn unreachable(err: &(dyn std::error::Error + 'static)) -> Self {
        RelayError::Unreachable(error_chain(err))
    }

    /// Status code sent to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::UpstreamStatus { status, .. } => *status,
            RelayError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::Unreachable(_)
            | RelayError::InvalidUpstream(_)
            | RelayError::BodyRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the error-kind metric.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::UpstreamStatus { .. } => "status",
            RelayError::Unreachable(_) => "unreachable",
            RelayError::InvalidUpstream(_) => "url",
            RelayError::BodyTooLarge { .. } | RelayError::BodyRead(_) => "body",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();

        let (upstream_headers, details) = match self {
            RelayError::UpstreamStatus { headers, details, .. } => (Some(headers), details),
            _ => (None, None),
        };

        let mut response = (status, Json(ErrorBody { error, details })).into_response();

        if let Some(upstream_headers) = upstream_headers {
            let out = response.headers_mut();
            for (name, value) in upstream_headers.iter() {
                if !describes_body(name) {
                    out.append(name.clone(), value.clone());
                }
            }
        }

        response
    }
}

/// Headers tied to the upstream body, which the error body replaces.
fn describes_body(name: &header::HeaderName) -> bool {
    name == header::CONTENT_TYPE
        || name == header::CONTENT_LENGTH
        || name == header::CONTENT_ENCODING
        || name == header::TRANSFER_ENCODING
}

/// Decode an upstream error payload: JSON when it parses, text otherwise,
/// nothing when empty.
pub fn parse_details(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
