//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (assign/propagate x-request-id)
//!     → cors.rs (answer preflights)
//!     → GET /test       → probe.rs
//!     → ANY <prefix>/*  → relay.rs → upstream
//!     → response.rs (errors rendered as JSON)
//!     → Send to client
//! ```

pub mod cors;
pub mod probe;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;

pub use relay::{ForwardedRequest, Relay};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::RelayError;
pub use server::{AppState, HttpServer, ServerError};
