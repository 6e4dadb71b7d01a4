//! Configuration settings.
//!
//! Defines the main `Config` struct and environment variable loading logic.

use crate::config::{GatewayError, Result};
use crate::security::address::Ipv6Block;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn get_env_u64_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn get_env_usize_or(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn parse_env<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env_or(key, default);
    raw.trim()
        .parse()
        .map_err(|e| GatewayError::Config(format!("{key}={raw}: {e}")))
}

fn get_env_list(key: &str) -> Vec<String> {
    get_env_or(key, "")
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn mount_prefix(key: &str, default: &str) -> Result<String> {
    let prefix = get_env_or(key, default);
    if !prefix.starts_with('/') {
        return Err(GatewayError::Config(format!(
            "{key} must start with '/', got {prefix:?}"
        )));
    }
    Ok(prefix)
}

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the gateway listens on.
    pub listen_addr: SocketAddr,
    /// Maximum number of concurrently served connections.
    pub concurrency_limit: usize,
    /// How long a connection may take to deliver its request head, in milliseconds.
    pub header_read_timeout_ms: u64,
    /// Mount prefix of the bare proxy namespace.
    pub proxy_prefix: String,
    /// Mount prefix of the WISP namespace.
    pub wisp_prefix: String,
    /// Upstream bare server.
    pub bare_upstream: SocketAddr,
    /// Upstream WISP server.
    pub wisp_upstream: SocketAddr,
    /// Upstream application server; the static site is served when unset.
    pub app_upstream: Option<SocketAddr>,
    /// Root directory of the built static site.
    pub static_root: PathBuf,
    /// Application path prefixes that go through the verification gate.
    pub app_gated_paths: Vec<String>,
    /// Name of the verification cookie.
    pub verify_cookie_name: String,
    /// Sentinel value of the verification cookie.
    pub verify_cookie_value: String,
    /// `Max-Age` of the verification cookie in seconds.
    pub verify_cookie_max_age_secs: u64,
    /// Delay before the challenge page reloads, in milliseconds.
    pub challenge_delay_ms: u64,
    /// Request header carrying the bot token (lowercase).
    pub bot_token_header: String,
    /// Secret keying the token fingerprint.
    pub bot_token_secret: Option<String>,
    /// Youngest accepted bot token, in milliseconds.
    pub bot_token_min_age_ms: u64,
    /// Oldest accepted bot token, in milliseconds.
    pub bot_token_max_age_ms: u64,
    /// How long a spent token fingerprint is remembered, in seconds.
    pub bot_token_retention_secs: u64,
    /// Interval of the registry sweeper, in seconds.
    pub registry_sweep_secs: u64,
    /// Block egress addresses are drawn from.
    pub egress_block: Ipv6Block,
    /// Sub-range of the egress block kept for infrastructure.
    pub egress_reserved: Option<Ipv6Block>,
    /// Logging format: "json" or "pretty".
    pub log_format: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if an address, mount prefix or egress
    /// block is malformed, or if the bot token age window is inverted.
    pub fn from_env() -> Result<Arc<Self>> {
        let listen_addr = parse_env("LISTEN_ADDR", "0.0.0.0:8080")?;
        let bare_upstream = parse_env("BARE_UPSTREAM", "127.0.0.1:8081")?;
        let wisp_upstream = parse_env("WISP_UPSTREAM", "127.0.0.1:8082")?;
        let app_upstream = get_env_opt("APP_UPSTREAM")
            .map(|s| {
                s.parse()
                    .map_err(|e| GatewayError::Config(format!("APP_UPSTREAM={s}: {e}")))
            })
            .transpose()?;

        let egress_block: Ipv6Block = parse_env("EGRESS_BLOCK", "fd00:6a6f:7274:6c00::/64")?;
        let egress_reserved = match get_env_opt("EGRESS_RESERVED") {
            Some(s) if s.eq_ignore_ascii_case("none") => None,
            Some(s) => Some(
                s.parse()
                    .map_err(|e| GatewayError::Config(format!("EGRESS_RESERVED={s}: {e}")))?,
            ),
            None => Some(
                "fd00:6a6f:7274:6c00::/112"
                    .parse()
                    .map_err(|e| GatewayError::Config(format!("EGRESS_RESERVED: {e}")))?,
            ),
        };

        let bot_token_min_age_ms = get_env_u64_or("BOT_TOKEN_MIN_AGE_MS", 1000);
        let bot_token_max_age_ms = get_env_u64_or("BOT_TOKEN_MAX_AGE_MS", 30_000);
        if bot_token_min_age_ms > bot_token_max_age_ms {
            return Err(GatewayError::Config(format!(
                "BOT_TOKEN_MIN_AGE_MS ({bot_token_min_age_ms}) exceeds BOT_TOKEN_MAX_AGE_MS ({bot_token_max_age_ms})"
            )));
        }

        Ok(Arc::new(Self {
            listen_addr,
            concurrency_limit: get_env_usize_or("CONCURRENCY_LIMIT", 1024),
            header_read_timeout_ms: get_env_u64_or("HEADER_READ_TIMEOUT_MS", 5000).max(1),
            proxy_prefix: mount_prefix("PROXY_PREFIX", "/bare/")?,
            wisp_prefix: mount_prefix("WISP_PREFIX", "/wisp/")?,
            bare_upstream,
            wisp_upstream,
            app_upstream,
            static_root: PathBuf::from(get_env_or("STATIC_ROOT", "public")),
            app_gated_paths: get_env_list("APP_GATED_PATHS"),
            verify_cookie_name: get_env_or("VERIFY_COOKIE_NAME", "verified"),
            verify_cookie_value: get_env_or("VERIFY_COOKIE_VALUE", "ok"),
            verify_cookie_max_age_secs: get_env_u64_or("VERIFY_COOKIE_MAX_AGE_SECS", 86_400),
            challenge_delay_ms: get_env_u64_or("CHALLENGE_DELAY_MS", 1500),
            bot_token_header: get_env_or("BOT_TOKEN_HEADER", "x-bot-token").to_ascii_lowercase(),
            bot_token_secret: get_env_opt("BOT_TOKEN_SECRET"),
            bot_token_min_age_ms,
            bot_token_max_age_ms,
            bot_token_retention_secs: get_env_u64_or("BOT_TOKEN_RETENTION_SECS", 60),
            registry_sweep_secs: get_env_u64_or("REGISTRY_SWEEP_SECS", 30).max(1),
            egress_block,
            egress_reserved,
            log_format: get_env_or("LOG_FORMAT", "json"),
        }))
    }

    /// Retention of spent token fingerprints in milliseconds.
    ///
    /// Never shorter than the maximum token age, so a token cannot be
    /// forgotten while it would still pass the freshness check.
    #[must_use]
    pub fn token_retention_ms(&self) -> u64 {
        self.bot_token_retention_secs
            .saturating_mul(1000)
            .max(self.bot_token_max_age_ms)
    }
}
