//! Startup banner.

use std::net::SocketAddr;

use crate::config::RelayConfig;

/// URL of the liveness probe as seen from the local machine.
pub fn probe_url(port: u16) -> String {
    format!("http://localhost:{port}/test")
}

/// Example relay URL for the default REST endpoint layout.
pub fn example_relay_url(port: u16, prefix: &str) -> String {
    format!("http://localhost:{port}{prefix}/rest/v1/your-endpoint")
}

/// Log where the relay listens, how to probe it and how to address it.
pub fn log_banner(config: &RelayConfig, local_addr: SocketAddr) {
    let port = local_addr.port();
    tracing::info!(
        port,
        upstream = %config.upstream.base_url,
        "Relay server running on port {port}"
    );
    tracing::info!("Test the server: {}", probe_url(port));
    tracing::info!(
        "Relay URL format: {}",
        example_relay_url(port, &config.upstream.path_prefix)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_urls() {
        assert_eq!(probe_url(4000), "http://localhost:4000/test");
        assert_eq!(
            example_relay_url(4000, "/proxy"),
            "http://localhost:4000/proxy/rest/v1/your-endpoint"
        );
    }
}
