//! Library definitions.
//!
//! Exports the gateway, its verification and addressing components, and the
//! stock downstream handlers.

pub mod config;
pub mod core;
pub mod features;
pub mod security;
pub mod web;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;
pub use config::{Config, GatewayError, Result};
pub use crate::core::gateway::{
    AppHandler, ConnectionLimits, Gateway, GatewayBody, Handlers, InboundConnection, Namespace,
    ProxyHandler, Route, RouteClassifier, TransportKind, WispHandler, run_listener,
    serve_listener,
};
pub use crate::core::middleware::AppGate;
pub use features::{StaticSite, UpstreamForwarder};
pub use security::address::{AddressAllocator, EgressAddress, Ipv6Block};
pub use security::verification::{
    SingleUseTokenRegistry, VerificationDecision, VerificationPolicy, spawn_sweeper,
};
pub use web::ui::preload_templates;
