//! Upstream forwarder.
//!
//! Relays requests and upgrade handshakes to an external bare or WISP server
//! over HTTP/1.1. Usable as any of the gateway's downstream handlers.

use crate::config::{GatewayError, Result};
use crate::core::gateway::classifier::path_under_prefix;
use crate::core::gateway::handlers::{AppHandler, ProxyHandler, WispHandler};
use crate::core::gateway::headers::{InboundConnection, TransportKind};
use crate::core::gateway::response::{GatewayBody, empty, plain_text};
use crate::security::address::EgressAddress;
use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::header::HeaderValue;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Header carrying the allocated egress address to the upstream.
pub const EGRESS_HEADER: &str = "x-egress-address";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct UpstreamForwarder {
    upstream: SocketAddr,
    mount_prefix: String,
}

impl UpstreamForwarder {
    /// Forwards to `upstream`. As a proxy handler it claims paths under
    /// `mount_prefix`.
    #[must_use]
    pub fn new(upstream: SocketAddr, mount_prefix: impl Into<String>) -> Self {
        Self {
            upstream,
            mount_prefix: mount_prefix.into(),
        }
    }

    async fn forward(&self, mut req: Request<Incoming>) -> Result<Response<GatewayBody>> {
        let is_upgrade = InboundConnection::from_request(&req).kind == TransportKind::Upgrade;
        let client_upgrade = is_upgrade.then(|| hyper::upgrade::on(&mut req));

        if let Some(egress) = req.extensions().get::<EgressAddress>().copied() {
            let value = HeaderValue::from_str(&egress.to_string())
                .map_err(|e| GatewayError::Upstream(e.to_string()))?;
            req.headers_mut().insert(EGRESS_HEADER, value);
        }

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(self.upstream))
            .await
            .map_err(|_| GatewayError::Upstream(format!("connect to {} timed out", self.upstream)))??;
        let _ = stream.set_nodelay(true);

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
        let upstream = self.upstream;
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                debug!(upstream = %upstream, error = %e, "Upstream connection ended");
            }
        });

        let mut resp = sender.send_request(req).await?;

        if resp.status() == StatusCode::SWITCHING_PROTOCOLS
            && let Some(client_upgrade) = client_upgrade
        {
            let upstream_upgrade = hyper::upgrade::on(&mut resp);
            tokio::spawn(async move {
                match tokio::try_join!(client_upgrade, upstream_upgrade) {
                    Ok((client, server)) => {
                        let mut client = TokioIo::new(client);
                        let mut server = TokioIo::new(server);
                        match tokio::io::copy_bidirectional(&mut client, &mut server).await {
                            Ok((from_client, from_server)) => debug!(
                                upstream = %upstream,
                                from_client,
                                from_server,
                                "Upgraded tunnel closed"
                            ),
                            Err(e) => debug!(upstream = %upstream, error = %e, "Upgraded tunnel error"),
                        }
                    }
                    Err(e) => warn!(upstream = %upstream, error = %e, "Upgrade relay failed"),
                }
            });
            return Ok(resp.map(|_| empty()));
        }

        Ok(resp.map(|body| body.boxed()))
    }

    async fn forward_or_bad_gateway(&self, req: Request<Incoming>) -> Response<GatewayBody> {
        let path = req.uri().path().to_string();
        match self.forward(req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(upstream = %self.upstream, path = %path, error = %e, "Upstream request failed");
                plain_text(StatusCode::BAD_GATEWAY, "Bad Gateway")
            }
        }
    }
}

#[async_trait]
impl ProxyHandler for UpstreamForwarder {
    fn should_route(&self, conn: &InboundConnection<'_>) -> bool {
        path_under_prefix(conn.path, &self.mount_prefix)
    }

    async fn route_request(&self, req: Request<Incoming>) -> Response<GatewayBody> {
        self.forward_or_bad_gateway(req).await
    }

    async fn route_upgrade(&self, req: Request<Incoming>) -> Response<GatewayBody> {
        self.forward_or_bad_gateway(req).await
    }
}

#[async_trait]
impl WispHandler for UpstreamForwarder {
    async fn route_upgrade(&self, req: Request<Incoming>) -> Response<GatewayBody> {
        self.forward_or_bad_gateway(req).await
    }
}

#[async_trait]
impl AppHandler for UpstreamForwarder {
    async fn handle(&self, req: Request<Incoming>) -> Response<GatewayBody> {
        self.forward_or_bad_gateway(req).await
    }
}
