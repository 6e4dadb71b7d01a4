//! Verification policy.
//!
//! Decides whether a request may reach the tunnel layer, must be challenged,
//! or is turned away. Every failure is a soft outcome; nothing here errors.

use crate::config::Config;
use crate::security::verification::browser::BrowserMatcher;
use crate::security::verification::registry::SingleUseTokenRegistry;
use crate::security::verification::token::{BotToken, Fingerprinter, TokenRejection};
use std::fmt;
use std::sync::Arc;

/// Outcome of the policy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationDecision {
    Allow,
    Reject,
    ChallengeAndStop,
}

/// Why a request was not counted as verified, or why it was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftFailure {
    MalformedToken,
    PrematureToken,
    ExpiredToken,
    ReplayedToken,
    NotBrowserLike,
    NotVerified,
    ParseFailure,
}

impl From<TokenRejection> for SoftFailure {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::Malformed => Self::MalformedToken,
            TokenRejection::Premature => Self::PrematureToken,
            TokenRejection::Expired => Self::ExpiredToken,
            TokenRejection::Replayed => Self::ReplayedToken,
        }
    }
}

impl fmt::Display for SoftFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MalformedToken => "malformed_token",
            Self::PrematureToken => "premature_token",
            Self::ExpiredToken => "expired_token",
            Self::ReplayedToken => "replayed_token",
            Self::NotBrowserLike => "not_browser_like",
            Self::NotVerified => "not_verified",
            Self::ParseFailure => "parse_failure",
        };
        f.write_str(s)
    }
}

/// Request observations the policy decides on.
///
/// A header that was present but unreadable is `None` here with
/// `parse_failure` set.
#[derive(Debug, Clone, Default)]
pub struct Signals<'a> {
    pub cookie: Option<String>,
    pub bot_token: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub accept: Option<&'a str>,
    pub parse_failure: bool,
}

/// Decision plus the facts that led to it, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub decision: VerificationDecision,
    pub browser_like: bool,
    pub verified: bool,
    pub reason: Option<SoftFailure>,
}

pub struct VerificationPolicy {
    cookie_value: String,
    min_age_ms: u64,
    max_age_ms: u64,
    browsers: BrowserMatcher,
    fingerprinter: Fingerprinter,
    registry: Arc<SingleUseTokenRegistry>,
}

impl VerificationPolicy {
    #[must_use]
    pub fn new(config: &Config, registry: Arc<SingleUseTokenRegistry>) -> Self {
        Self {
            cookie_value: config.verify_cookie_value.clone(),
            min_age_ms: config.bot_token_min_age_ms,
            max_age_ms: config.bot_token_max_age_ms,
            browsers: BrowserMatcher::new(),
            fingerprinter: Fingerprinter::new(config.bot_token_secret.as_deref()),
            registry,
        }
    }

    /// Assesses `signals` at the current wall-clock time.
    #[must_use]
    pub fn assess(&self, signals: &Signals<'_>) -> Assessment {
        self.assess_at(signals, super::now_ms())
    }

    /// Assesses `signals` as if the current time were `now_ms`.
    ///
    /// A bot token is only looked at (and spent) for browser-like clients
    /// without a valid cookie, since any other client is decided without it.
    #[must_use]
    pub fn assess_at(&self, signals: &Signals<'_>, now_ms: u64) -> Assessment {
        let browser_like = self.browsers.is_browser_like(signals.user_agent);
        if !browser_like {
            return Assessment {
                decision: VerificationDecision::Reject,
                browser_like,
                verified: false,
                reason: Some(SoftFailure::NotBrowserLike),
            };
        }

        let (verified, failure) = self.prior_verification(signals, now_ms);
        if verified {
            return Assessment {
                decision: VerificationDecision::Allow,
                browser_like,
                verified,
                reason: None,
            };
        }

        let decision = if accepts_html(signals.accept) {
            VerificationDecision::ChallengeAndStop
        } else {
            VerificationDecision::Allow
        };
        Assessment {
            decision,
            browser_like,
            verified,
            reason: Some(failure),
        }
    }

    /// Returns `(browser_like, cookie_verified)` without looking at the bot
    /// token, for connections that are never gated.
    #[must_use]
    pub fn inspect(&self, signals: &Signals<'_>) -> (bool, bool) {
        (
            self.browsers.is_browser_like(signals.user_agent),
            self.cookie_matches(signals),
        )
    }

    fn cookie_matches(&self, signals: &Signals<'_>) -> bool {
        signals
            .cookie
            .as_deref()
            .is_some_and(|v| v == self.cookie_value)
    }

    fn prior_verification(&self, signals: &Signals<'_>, now_ms: u64) -> (bool, SoftFailure) {
        if self.cookie_matches(signals) {
            return (true, SoftFailure::NotVerified);
        }

        match signals.bot_token {
            Some(raw) => match self.validate_token(raw, now_ms) {
                Ok(()) => (true, SoftFailure::NotVerified),
                Err(rejection) => (false, rejection.into()),
            },
            None if signals.parse_failure => (false, SoftFailure::ParseFailure),
            None => (false, SoftFailure::NotVerified),
        }
    }

    /// Validates a raw bot token and spends it.
    ///
    /// # Errors
    ///
    /// Returns the `TokenRejection` describing why the token is unusable.
    pub fn validate_token(&self, raw: &str, now_ms: u64) -> Result<(), TokenRejection> {
        let token = BotToken::parse(raw)?;
        token.check_age(now_ms, self.min_age_ms, self.max_age_ms)?;
        if self
            .registry
            .try_consume(self.fingerprinter.fingerprint(raw), now_ms)
        {
            Ok(())
        } else {
            Err(TokenRejection::Replayed)
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SingleUseTokenRegistry> {
        &self.registry
    }
}

fn accepts_html(accept: Option<&str>) -> bool {
    accept.is_some_and(|a| a.to_ascii_lowercase().contains("text/html"))
}
