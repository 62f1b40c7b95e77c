//! Liveness probe over a real socket.

use reqwest::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_probe_reports_running() {
    let relay = common::start_relay(common::relay_config(common::unused_addr().await)).await;

    let res = common::client().get(relay.url("/test")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(
        common::json_body(res).await,
        json!({"status": "ok", "message": "Proxy server is running"})
    );
}

#[tokio::test]
async fn test_probe_does_not_touch_upstream() {
    // Upstream is down; the probe must still answer.
    let relay = common::start_relay(common::relay_config(common::unused_addr().await)).await;

    for _ in 0..3 {
        let res = common::client().get(relay.url("/test")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
