//! Connection dispatcher.
//!
//! Wires classification, verification and address tagging together for
//! both plain requests and upgrade handshakes.
//!
//! | transport | namespace | outcome |
//! |---|---|---|
//! | http | app, wisp | application handler |
//! | http | proxy | verify: forward tagged, 403, or challenge page |
//! | upgrade | app | drop |
//! | upgrade | wisp | WISP handler, unverified |
//! | upgrade | proxy | verify: forward tagged, or drop |

use crate::config::{Config, GatewayError, Result};
use crate::core::gateway::challenge::ChallengeResponder;
use crate::core::gateway::classifier::{Namespace, RouteClassifier};
use crate::core::gateway::handlers::{AppHandler, ProxyHandler, WispHandler};
use crate::core::gateway::headers::{InboundConnection, RequestHeaders, TransportKind};
use crate::core::gateway::response::{GatewayBody, forbidden};
use crate::security::address::{AddressAllocator, EgressAddress};
use crate::security::verification::{VerificationDecision, VerificationPolicy};
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::sync::Arc;
use tracing::{debug, info};

/// Downstream handlers the gateway dispatches to.
#[derive(Clone)]
pub struct Handlers {
    pub proxy: Arc<dyn ProxyHandler>,
    pub wisp: Arc<dyn WispHandler>,
    pub app: Arc<dyn AppHandler>,
}

/// Where one inbound connection goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Application,
    Proxy(EgressAddress),
    Wisp,
    Forbidden,
    Challenge,
    Drop,
}

pub struct Gateway {
    policy: Arc<VerificationPolicy>,
    allocator: AddressAllocator,
    classifier: RouteClassifier,
    responder: ChallengeResponder,
    cookie_name: String,
    token_header: String,
    handlers: Handlers,
}

impl Gateway {
    /// Builds the gateway.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::AddressBlock` if the egress block cannot be
    /// allocated from.
    pub fn new(
        config: &Config,
        policy: Arc<VerificationPolicy>,
        handlers: Handlers,
    ) -> Result<Self> {
        Ok(Self {
            policy,
            allocator: AddressAllocator::new(config.egress_block, config.egress_reserved)?,
            classifier: RouteClassifier::new(config.wisp_prefix.clone()),
            responder: ChallengeResponder::new(config),
            cookie_name: config.verify_cookie_name.clone(),
            token_header: config.bot_token_header.clone(),
            handlers,
        })
    }

    /// Decides where `conn` goes. Runs verification only for the proxy
    /// namespace.
    #[must_use]
    pub fn route(&self, conn: &InboundConnection<'_>) -> Route {
        let namespace = self.classifier.classify(conn, self.handlers.proxy.as_ref());
        match conn.kind {
            TransportKind::Http => self.route_http(conn, namespace),
            TransportKind::Upgrade => self.route_upgrade(conn, namespace),
        }
    }

    fn route_http(&self, conn: &InboundConnection<'_>, namespace: Namespace) -> Route {
        match namespace {
            Namespace::App | Namespace::Wisp => Route::Application,
            Namespace::Proxy => {
                let signals = conn.headers.signals(&self.cookie_name, &self.token_header);
                let assessment = self.policy.assess(&signals);
                debug!(
                    path = %conn.path,
                    decision = ?assessment.decision,
                    reason = ?assessment.reason.map(|r| r.to_string()),
                    "Proxy request assessed"
                );
                match assessment.decision {
                    VerificationDecision::Allow => Route::Proxy(self.allocator.allocate()),
                    VerificationDecision::Reject => Route::Forbidden,
                    VerificationDecision::ChallengeAndStop => Route::Challenge,
                }
            }
        }
    }

    fn route_upgrade(&self, conn: &InboundConnection<'_>, namespace: Namespace) -> Route {
        let signals = conn.headers.signals(&self.cookie_name, &self.token_header);
        let (route, browser_like, verified, reason) = match namespace {
            Namespace::Proxy => {
                let assessment = self.policy.assess(&signals);
                let route = if assessment.decision == VerificationDecision::Allow {
                    Route::Proxy(self.allocator.allocate())
                } else {
                    Route::Drop
                };
                (
                    route,
                    assessment.browser_like,
                    assessment.verified,
                    assessment.reason,
                )
            }
            Namespace::Wisp | Namespace::App => {
                let (browser_like, verified) = self.policy.inspect(&signals);
                let route = if namespace == Namespace::Wisp {
                    Route::Wisp
                } else {
                    Route::Drop
                };
                (route, browser_like, verified, None)
            }
        };

        info!(
            path = %conn.path,
            host = conn.headers.host().unwrap_or_default(),
            namespace = ?namespace,
            verified,
            browser_like,
            reason = ?reason.map(|r| r.to_string()),
            cookie = conn.headers.raw_cookie().unwrap_or_default(),
            route = ?route,
            "Upgrade attempt"
        );
        route
    }

    /// Serves one request.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConnectionDropped` for rejected upgrades; the
    /// connection is closed without a response.
    pub async fn serve(&self, mut req: Request<Incoming>) -> Result<Response<GatewayBody>> {
        let (kind, route) = {
            let conn = InboundConnection::from_request(&req);
            (conn.kind, self.route(&conn))
        };

        match route {
            Route::Application => Ok(self.handlers.app.handle(req).await),
            Route::Proxy(egress) => {
                req.extensions_mut().insert(egress);
                Ok(match kind {
                    TransportKind::Http => self.handlers.proxy.route_request(req).await,
                    TransportKind::Upgrade => self.handlers.proxy.route_upgrade(req).await,
                })
            }
            Route::Wisp => Ok(self.handlers.wisp.route_upgrade(req).await),
            Route::Forbidden => Ok(forbidden()),
            Route::Challenge => Ok(self.responder.respond(&RequestHeaders::new(req.headers()))),
            Route::Drop => Err(GatewayError::ConnectionDropped),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &Arc<VerificationPolicy> {
        &self.policy
    }
}
