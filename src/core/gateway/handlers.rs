//! Downstream collaborator interfaces.
//!
//! The gateway decides where a connection goes; these handlers own it from
//! there on. Tagged requests carry an [`EgressAddress`](crate::security::address::EgressAddress)
//! in their extensions.

use crate::core::gateway::headers::InboundConnection;
use crate::core::gateway::response::GatewayBody;
use async_trait::async_trait;
use hyper::body::Incoming;
use hyper::{Request, Response};

/// The bare proxy component.
#[async_trait]
pub trait ProxyHandler: Send + Sync {
    /// Whether `conn` belongs to the proxy namespace.
    fn should_route(&self, conn: &InboundConnection<'_>) -> bool;

    async fn route_request(&self, req: Request<Incoming>) -> Response<GatewayBody>;

    /// Handles an upgrade handshake; the handler completes it by returning
    /// `101 Switching Protocols` and taking over the upgraded stream.
    async fn route_upgrade(&self, req: Request<Incoming>) -> Response<GatewayBody>;
}

/// The WISP tunnel component.
#[async_trait]
pub trait WispHandler: Send + Sync {
    async fn route_upgrade(&self, req: Request<Incoming>) -> Response<GatewayBody>;
}

/// The application server every other request falls back to.
#[async_trait]
pub trait AppHandler: Send + Sync {
    async fn handle(&self, req: Request<Incoming>) -> Response<GatewayBody>;
}
