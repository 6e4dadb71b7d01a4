use crate::common::{
    CHROME, CURL, create_test_config, echo_roundtrip, send_raw, spawn_recording_gateway,
    upgrade_request,
};
use portal_gate::security::verification::{BotToken, now_ms};

#[tokio::test]
async fn test_wisp_upgrade_bypasses_verification() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;

    let request = upgrade_request("/wisp/", &[("User-Agent", CURL)]);
    let (mut stream, head) = send_raw(port, &request).await;

    assert!(head.starts_with("HTTP/1.1 101"), "{head}");
    assert_eq!(echo_roundtrip(&mut stream, b"wisp frame").await, b"wisp frame");

    let calls = recorder.calls_to("wisp");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/wisp/");
    assert!(calls[0].egress.is_none());
}

#[tokio::test]
async fn test_wisp_upgrade_without_any_headers() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;

    let (_stream, head) = send_raw(port, &upgrade_request("/wisp/tunnel", &[])).await;
    assert!(head.starts_with("HTTP/1.1 101"), "{head}");
    assert_eq!(recorder.calls_to("wisp").len(), 1);
}

#[tokio::test]
async fn test_non_browser_proxy_upgrade_dropped() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;

    let request = upgrade_request("/bare/", &[("User-Agent", CURL), ("Cookie", "verified=ok")]);
    let (_stream, head) = send_raw(port, &request).await;

    assert!(head.is_empty(), "expected a silent close, got {head}");
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_unverified_browser_proxy_upgrade_forwarded() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;

    let request = upgrade_request("/bare/", &[("User-Agent", CHROME)]);
    let (mut stream, head) = send_raw(port, &request).await;

    assert!(head.starts_with("HTTP/1.1 101"), "{head}");
    assert_eq!(echo_roundtrip(&mut stream, b"ws").await, b"ws");
    let calls = recorder.calls_to("proxy_upgrade");
    assert_eq!(calls.len(), 1);
    assert!(calls[0].egress.is_some());
}

#[tokio::test]
async fn test_verified_proxy_upgrade_forwarded_with_address() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;

    let request = upgrade_request("/bare/", &[("User-Agent", CHROME), ("Cookie", "verified=ok")]);
    let (mut stream, head) = send_raw(port, &request).await;

    assert!(head.starts_with("HTTP/1.1 101"), "{head}");
    assert_eq!(echo_roundtrip(&mut stream, b"bare").await, b"bare");

    let calls = recorder.calls_to("proxy_upgrade");
    assert_eq!(calls.len(), 1);
    let egress = calls[0].egress.expect("proxied upgrade carries an address");
    assert!(config.egress_block.contains(egress.0));
}

#[tokio::test]
async fn test_replayed_token_upgrade_falls_back_to_browser_rules() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;
    let token = BotToken::encode(now_ms() - 5_000, "upgrade");
    let request = upgrade_request("/bare/", &[("User-Agent", CHROME), ("X-Bot-Token", token.as_str())]);

    let (_first, head) = send_raw(port, &request).await;
    assert!(head.starts_with("HTTP/1.1 101"), "{head}");

    // The replay is unverified, but a browser-like handshake is still let through.
    let (_second, head) = send_raw(port, &request).await;
    assert!(head.starts_with("HTTP/1.1 101"), "{head}");

    // A non-browser presenting the same token is turned away regardless.
    let request = upgrade_request("/bare/", &[("User-Agent", CURL), ("X-Bot-Token", token.as_str())]);
    let (_third, head) = send_raw(port, &request).await;
    assert!(head.is_empty(), "{head}");

    assert_eq!(recorder.calls_to("proxy_upgrade").len(), 2);
}

#[tokio::test]
async fn test_upgrade_outside_tunnel_namespaces_dropped() {
    let config = create_test_config();
    let (port, recorder) = spawn_recording_gateway(&config).await;

    let request = upgrade_request("/socket", &[("User-Agent", CHROME), ("Cookie", "verified=ok")]);
    let (_stream, head) = send_raw(port, &request).await;

    assert!(head.is_empty(), "{head}");
    assert!(recorder.calls().is_empty());
}
