//! Test utilities and shared configuration.
//!
//! This module provides common helpers for unit and integration tests,
//! reducing duplication across the codebase.

#[cfg(any(test, feature = "testing"))]
use crate::config::Config;
#[cfg(any(test, feature = "testing"))]
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
#[cfg(any(test, feature = "testing"))]
use std::path::PathBuf;
#[cfg(any(test, feature = "testing"))]
use std::sync::Arc;

/// Creates a standard configuration for testing purposes.
///
/// This configuration has:
/// - Loopback upstreams on ports 8081/8082 and no application upstream
/// - `/bare/` and `/wisp/` mounts, no gated application paths
/// - The `verified=ok` cookie and the `x-bot-token` header
/// - A 1s to 30s bot token window with 60s retention
#[cfg(any(test, feature = "testing"))]
#[must_use]
pub fn create_test_config() -> Arc<Config> {
    Arc::new(Config {
        listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        concurrency_limit: 64,
        header_read_timeout_ms: 5000,
        proxy_prefix: "/bare/".to_string(),
        wisp_prefix: "/wisp/".to_string(),
        bare_upstream: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8081),
        wisp_upstream: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8082),
        app_upstream: None,
        static_root: PathBuf::from("public"),
        app_gated_paths: vec![],
        verify_cookie_name: "verified".to_string(),
        verify_cookie_value: "ok".to_string(),
        verify_cookie_max_age_secs: 86_400,
        challenge_delay_ms: 1500,
        bot_token_header: "x-bot-token".to_string(),
        bot_token_secret: Some("test-secret".to_string()),
        bot_token_min_age_ms: 1000,
        bot_token_max_age_ms: 30_000,
        bot_token_retention_secs: 60,
        registry_sweep_secs: 30,
        egress_block: "fd00:6a6f:7274:6c00::/64"
            .parse()
            .expect("valid egress block"),
        egress_reserved: Some(
            "fd00:6a6f:7274:6c00::/112"
                .parse()
                .expect("valid reserved block"),
        ),
        log_format: "pretty".to_string(),
    })
}
