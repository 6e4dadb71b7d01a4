//! Route classification.

use crate::core::gateway::handlers::ProxyHandler;
use crate::core::gateway::headers::InboundConnection;

/// Logical category of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Proxy,
    Wisp,
    App,
}

/// Sorts inbound connections into namespaces.
///
/// The proxy namespace is whatever the proxy component claims through its
/// own predicate and is checked first. The WISP namespace is a plain prefix
/// match. Everything else belongs to the application.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    wisp_prefix: String,
}

impl RouteClassifier {
    #[must_use]
    pub fn new(wisp_prefix: impl Into<String>) -> Self {
        Self {
            wisp_prefix: wisp_prefix.into(),
        }
    }

    #[must_use]
    pub fn classify(&self, conn: &InboundConnection<'_>, proxy: &dyn ProxyHandler) -> Namespace {
        if proxy.should_route(conn) {
            Namespace::Proxy
        } else if conn.path.starts_with(&self.wisp_prefix) {
            Namespace::Wisp
        } else {
            Namespace::App
        }
    }
}

/// Prefix predicate used by the stock proxy collaborators.
///
/// The bare prefix itself matches with or without its trailing slash.
#[must_use]
pub fn path_under_prefix(path: &str, prefix: &str) -> bool {
    path.starts_with(prefix) || prefix.strip_suffix('/').is_some_and(|bare| path == bare)
}
