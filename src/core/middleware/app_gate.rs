//! Application-level verification gate.
//!
//! Wraps the application handler so selected route prefixes go through the
//! same verification policy as the proxy namespace. Other paths pass
//! straight through.

use crate::config::Config;
use crate::core::gateway::challenge::ChallengeResponder;
use crate::core::gateway::handlers::AppHandler;
use crate::core::gateway::headers::RequestHeaders;
use crate::core::gateway::response::{GatewayBody, forbidden};
use crate::security::verification::{VerificationDecision, VerificationPolicy};
use async_trait::async_trait;
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::sync::Arc;
use tracing::debug;

pub struct AppGate {
    inner: Arc<dyn AppHandler>,
    gated_paths: Vec<String>,
    policy: Arc<VerificationPolicy>,
    responder: ChallengeResponder,
    cookie_name: String,
    token_header: String,
}

impl AppGate {
    #[must_use]
    pub fn new(config: &Config, policy: Arc<VerificationPolicy>, inner: Arc<dyn AppHandler>) -> Self {
        Self {
            inner,
            gated_paths: config.app_gated_paths.clone(),
            policy,
            responder: ChallengeResponder::new(config),
            cookie_name: config.verify_cookie_name.clone(),
            token_header: config.bot_token_header.clone(),
        }
    }

    #[must_use]
    pub fn is_gated(&self, path: &str) -> bool {
        self.gated_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

#[async_trait]
impl AppHandler for AppGate {
    async fn handle(&self, req: Request<Incoming>) -> Response<GatewayBody> {
        if !self.is_gated(req.uri().path()) {
            return self.inner.handle(req).await;
        }

        let decision = {
            let headers = RequestHeaders::new(req.headers());
            let assessment = self
                .policy
                .assess(&headers.signals(&self.cookie_name, &self.token_header));
            debug!(
                path = %req.uri().path(),
                decision = ?assessment.decision,
                reason = ?assessment.reason.map(|r| r.to_string()),
                "Gated application request assessed"
            );
            assessment.decision
        };

        match decision {
            VerificationDecision::Allow => self.inner.handle(req).await,
            VerificationDecision::Reject => forbidden(),
            VerificationDecision::ChallengeAndStop => {
                self.responder.respond(&RequestHeaders::new(req.headers()))
            }
        }
    }
}
