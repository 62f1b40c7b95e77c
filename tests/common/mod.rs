//! Shared utilities for integration testing: a programmable mock upstream
//! and a relay started on ephemeral ports.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::Path,
    http::{header, HeaderMap, Request, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use supabase_relay::http::ServerError;
use supabase_relay::{HttpServer, RelayConfig, Shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Credential the test relay injects when the caller sends none.
pub const DEFAULT_KEY: &str = "test-anon-key";

/// Length of the `/big-error` payload.
#[allow(dead_code)]
pub const BIG_ERROR_LEN: usize = 64;

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Echo what the upstream received as JSON.
async fn echo(req: Request<Body>) -> Response {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    let echo = json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "host": header_str(&parts.headers, "host"),
        "apikey": header_str(&parts.headers, "apikey"),
        "authorization": header_str(&parts.headers, "authorization"),
        "content_type": header_str(&parts.headers, "content-type"),
        "request_id": header_str(&parts.headers, "x-request-id"),
        "body": String::from_utf8_lossy(&body),
    });

    (
        AppendHeaders([("set-cookie", "a=1"), ("set-cookie", "b=2")]),
        [
            ("x-upstream", "mock"),
            ("x-upstream-method", parts.method.as_str()),
            ("content-range", "0-0/1"),
        ],
        Json(echo),
    )
        .into_response()
}

/// Answer with the requested status and a JSON payload.
async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::IM_A_TEAPOT);
    (
        status,
        [("x-upstream", "mock")],
        Json(json!({"code": code, "message": "mock status"})),
    )
        .into_response()
}

async fn plain_error() -> Response {
    (StatusCode::BAD_GATEWAY, [("x-upstream", "mock")], "upstream exploded").into_response()
}

/// A 500 whose body is [`BIG_ERROR_LEN`] bytes of `x`.
async fn big_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "x".repeat(BIG_ERROR_LEN)).into_response()
}

async fn redirect() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/elsewhere")]).into_response()
}

/// Start the mock upstream on an ephemeral port.
pub async fn start_mock_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/status/{code}", any(status))
        .route("/plain-error", any(plain_error))
        .route("/big-error", any(big_error))
        .route("/redirect", any(redirect))
        .fallback(echo);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Relay config pointed at `upstream` with a known default credential.
pub fn relay_config(upstream: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.upstream.base_url = format!("http://{upstream}");
    config.upstream.api_key = DEFAULT_KEY.to_string();
    config
}

/// A running relay.
pub struct TestRelay {
    pub addr: SocketAddr,
    #[allow(dead_code)]
    pub shutdown: Shutdown,
    #[allow(dead_code)]
    pub task: JoinHandle<Result<(), ServerError>>,
}

impl TestRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the relay on an ephemeral port.
pub async fn start_relay(config: RelayConfig) -> TestRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let task = tokio::spawn(async move { server.run(listener, rx).await });

    TestRelay { addr, shutdown, task }
}

/// Client that talks to the relay directly and never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Parse a response body as JSON.
pub async fn json_body(res: reqwest::Response) -> Value {
    res.json().await.unwrap()
}
