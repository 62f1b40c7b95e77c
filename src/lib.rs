//! HTTP relay in front of a backend-as-a-service API.
//!
//! Requests under a path prefix are forwarded to a fixed upstream origin with
//! a default `apikey` filled in when the caller omits one; `GET /test`
//! reports liveness.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
