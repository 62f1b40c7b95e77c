//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the probe and relay handlers
//! - Wire up middleware (request ID, tracing, CORS, optional timeout)
//! - Build the shared upstream client
//! - Serve on a listener until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::validation::ValidationError;
use crate::config::RelayConfig;
use crate::http::cors::with_cors;
use crate::http::probe::{probe_handler, PROBE_PATH};
use crate::http::relay::{relay_handler, Relay};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::shutdown;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub client: reqwest::Client,
}

/// Error type for server construction and serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid relay settings: {0}")]
    Config(#[from] ValidationError),
    #[error("Failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: Arc<RelayConfig>,
}

/// Hops followed when `upstream.follow_redirects` is on.
const MAX_REDIRECTS: usize = 5;

/// Upstream client shared by all handlers.
///
/// Redirects are relayed to the caller unless `follow_redirects` is set.
/// No timeout is set beyond the client's defaults.
pub fn build_client(follow_redirects: bool) -> Result<reqwest::Client, reqwest::Error> {
    let policy = if follow_redirects {
        reqwest::redirect::Policy::limited(MAX_REDIRECTS)
    } else {
        reqwest::redirect::Policy::none()
    };
    reqwest::Client::builder().redirect(policy).build()
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        let state = AppState {
            relay: Arc::new(Relay::from_config(&config)?),
            client: build_client(config.upstream.follow_redirects)?,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config: Arc::new(config),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let prefix = state.relay.path_prefix().to_string();

        let mut handlers = Router::new()
            .route(PROBE_PATH, get(probe_handler))
            .route(&format!("{prefix}/"), any(relay_handler))
            .route(&format!("{prefix}/{{*path}}"), any(relay_handler))
            .with_state(state);

        if let Some(secs) = config.timeouts.request_secs {
            handlers = handlers.layer(TimeoutLayer::new(Duration::from_secs(secs)));
        }

        with_cors(handlers, &config.cors).layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id = %request_id(req.headers())
                    )
                }))
                .layer(propagate_request_id_layer()),
        )
    }

    /// A clone of the fully layered router, for driving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}
