//! Challenge responder.
//!
//! Serves the self-reloading page that marks a browser as verified. Only
//! used on the HTTP path; failed upgrades are dropped instead.

use crate::config::Config;
use crate::core::gateway::headers::RequestHeaders;
use crate::core::gateway::response::{GatewayBody, html};
use crate::core::middleware::format_set_cookie;
use crate::web::ui::get_challenge_page;
use hyper::{Response, StatusCode};

#[derive(Debug, Clone)]
pub struct ChallengeResponder {
    cookie_name: String,
    cookie_value: String,
    max_age_secs: u64,
    delay_ms: u64,
}

impl ChallengeResponder {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            cookie_name: config.verify_cookie_name.clone(),
            cookie_value: config.verify_cookie_value.clone(),
            max_age_secs: config.verify_cookie_max_age_secs,
            delay_ms: config.challenge_delay_ms,
        }
    }

    /// Builds the `200` challenge response for the request described by `headers`.
    #[must_use]
    pub fn respond(&self, headers: &RequestHeaders<'_>) -> Response<GatewayBody> {
        let secure = headers.forwarded_https();
        let set_cookie = self.cookie(true, secure);
        let page = get_challenge_page(&self.cookie(false, secure), self.delay_ms);
        html(StatusCode::OK, page, Some(&set_cookie))
    }

    fn cookie(&self, http_only: bool, secure: bool) -> String {
        format_set_cookie(
            &self.cookie_name,
            &self.cookie_value,
            self.max_age_secs,
            http_only,
            secure,
        )
    }
}
