//! TCP accept loop.
//!
//! Accepts connections under a concurrency limit and serves each one with
//! hyper's HTTP/1 connection driver, upgrades enabled.

use crate::config::{Config, GatewayError, Result};
use crate::core::gateway::dispatcher::Gateway;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Binds the configured address and serves the gateway until the task is
/// cancelled.
///
/// # Errors
///
/// Returns `GatewayError::Io` if the listener cannot be bound.
pub async fn run_listener(config: Arc<Config>, gateway: Arc<Gateway>) -> Result<()> {
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(
        listen_addr = %config.listen_addr,
        concurrency_limit = config.concurrency_limit,
        header_read_timeout_ms = config.header_read_timeout_ms,
        "Gateway listener started"
    );
    serve_listener(listener, gateway, ConnectionLimits::from_config(&config)).await;
    Ok(())
}

/// Per-listener connection bounds.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub concurrency_limit: usize,
    /// Deadline for the first byte of a connection and for each request head.
    pub header_read_timeout: Duration,
}

impl ConnectionLimits {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency_limit: config.concurrency_limit,
            header_read_timeout: Duration::from_millis(config.header_read_timeout_ms),
        }
    }
}

/// Serves connections accepted on `listener`.
///
/// A connection holds one permit until it closes or its upgrade is handed
/// off. Connections that send nothing within the header read timeout are
/// closed so idle sockets cannot hold every permit.
pub async fn serve_listener(listener: TcpListener, gateway: Arc<Gateway>, limits: ConnectionLimits) {
    let connection_limit = Arc::new(Semaphore::new(limits.concurrency_limit.max(1)));

    loop {
        let Ok(permit) = connection_limit.clone().acquire_owned().await else {
            break;
        };

        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                configure_tcp_stream(&stream);
                let gateway = gateway.clone();
                tokio::spawn(async move {
                    let _permit = permit;

                    if !first_byte_arrives(&stream, limits.header_read_timeout).await {
                        debug!(peer_addr = %peer_addr, "Request header read timed out");
                        return;
                    }

                    let service = service_fn(move |req| {
                        let gateway = gateway.clone();
                        async move { gateway.serve(req).await }
                    });

                    if let Err(e) = http1::Builder::new()
                        .timer(TokioTimer::new())
                        .header_read_timeout(limits.header_read_timeout)
                        .serve_connection(TokioIo::new(stream), service)
                        .with_upgrades()
                        .await
                    {
                        if dropped_on_purpose(&e) {
                            debug!(peer_addr = %peer_addr, "Connection dropped after failed verification");
                        } else {
                            debug!(peer_addr = %peer_addr, error = %e, "Connection error");
                        }
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "Accept error");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Waits for the client to send anything at all. `false` on timeout, EOF or
/// a socket error.
async fn first_byte_arrives(stream: &TcpStream, timeout: Duration) -> bool {
    let mut first = [0u8; 1];
    matches!(
        tokio::time::timeout(timeout, stream.peek(&mut first)).await,
        Ok(Ok(n)) if n > 0
    )
}

fn dropped_on_purpose(e: &hyper::Error) -> bool {
    std::error::Error::source(e)
        .and_then(|source| source.downcast_ref::<GatewayError>())
        .is_some_and(|ge| matches!(ge, GatewayError::ConnectionDropped))
}

fn configure_tcp_stream(stream: &TcpStream) {
    let sock = socket2::SockRef::from(stream);

    let _ = stream.set_nodelay(true);

    let mut ka = socket2::TcpKeepalive::new()
        .with_time(Duration::from_secs(60))
        .with_interval(Duration::from_secs(10));

    #[cfg(not(target_os = "openbsd"))]
    {
        ka = ka.with_retries(3);
    }

    let _ = sock.set_tcp_keepalive(&ka);

    #[cfg(target_os = "linux")]
    {
        let _ = sock.set_tcp_user_timeout(Some(Duration::from_millis(10_000)));
    }
}
