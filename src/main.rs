//! `portal-gate` - Connection classification and verification gateway.
//!
//! Copyright (C) 2026 Maverick
//! SPDX-License-Identifier: AGPL-3.0-only
//!
//! Initializes the runtime, loads configuration, sets up logging, and serves
//! the gateway until interrupted.

use portal_gate::{
    AppGate, AppHandler, Config, Gateway, Handlers, SingleUseTokenRegistry, StaticSite,
    UpstreamForwarder, VerificationPolicy, preload_templates, run_listener, spawn_sweeper,
};

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(non_blocking);

    if log_format.eq_ignore_ascii_case("pretty") {
        subscriber.init();
    } else {
        subscriber.json().init();
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Gateway stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> portal_gate::Result<()> {
    let config = Config::from_env()?;
    preload_templates();
    info!(
        listen_addr = %config.listen_addr,
        proxy_prefix = %config.proxy_prefix,
        wisp_prefix = %config.wisp_prefix,
        bare_upstream = %config.bare_upstream,
        wisp_upstream = %config.wisp_upstream,
        app_upstream = ?config.app_upstream,
        egress_block = %config.egress_block,
        log_format = %config.log_format,
        "Server initialized"
    );

    let registry = Arc::new(SingleUseTokenRegistry::new(config.token_retention_ms()));
    let sweeper = spawn_sweeper(
        registry.clone(),
        Duration::from_secs(config.registry_sweep_secs),
    );
    let policy = Arc::new(VerificationPolicy::new(&config, registry));

    let app: Arc<dyn AppHandler> = match config.app_upstream {
        Some(upstream) => Arc::new(UpstreamForwarder::new(upstream, "/")),
        None => Arc::new(StaticSite::new(config.static_root.clone())),
    };
    let app: Arc<dyn AppHandler> = if config.app_gated_paths.is_empty() {
        app
    } else {
        Arc::new(AppGate::new(&config, policy.clone(), app))
    };

    let handlers = Handlers {
        proxy: Arc::new(UpstreamForwarder::new(
            config.bare_upstream,
            config.proxy_prefix.clone(),
        )),
        wisp: Arc::new(UpstreamForwarder::new(
            config.wisp_upstream,
            config.wisp_prefix.clone(),
        )),
        app,
    };
    let gateway = Arc::new(Gateway::new(&config, policy, handlers)?);

    let result = tokio::select! {
        result = run_listener(config.clone(), gateway) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };
    sweeper.abort();
    result
}
