//! Connection classification and verification gateway.
//!
//! Every inbound request and upgrade handshake passes through [`Gateway`],
//! which decides between the application, the proxy and the WISP handler.

pub mod challenge;
pub mod classifier;
pub mod dispatcher;
pub mod handlers;
pub mod headers;
pub mod listener;
pub mod response;

pub use challenge::ChallengeResponder;
pub use classifier::{Namespace, RouteClassifier, path_under_prefix};
pub use dispatcher::{Gateway, Handlers, Route};
pub use handlers::{AppHandler, ProxyHandler, WispHandler};
pub use headers::{HeaderText, InboundConnection, RequestHeaders, TransportKind};
pub use listener::{ConnectionLimits, run_listener, serve_listener};
pub use response::{GatewayBody, empty, forbidden, full, html, plain_text};
