//! Typed access to inbound request headers.
//!
//! Header names are case-insensitive; absent and unreadable (non-UTF-8)
//! values are told apart so the policy can report parse failures.

use crate::core::middleware::find_cookie;
use crate::security::verification::Signals;
use hyper::header::{self, AsHeaderName, HeaderMap};
use hyper::{Method, Request};

/// Transport kind of an inbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    Upgrade,
}

/// Result of reading one header as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderText<'a> {
    Absent,
    Text(&'a str),
    Unreadable,
}

impl<'a> HeaderText<'a> {
    #[must_use]
    pub const fn ok(self) -> Option<&'a str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Absent | Self::Unreadable => None,
        }
    }

    #[must_use]
    pub const fn is_unreadable(self) -> bool {
        matches!(self, Self::Unreadable)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestHeaders<'a> {
    map: &'a HeaderMap,
}

impl<'a> RequestHeaders<'a> {
    #[must_use]
    pub const fn new(map: &'a HeaderMap) -> Self {
        Self { map }
    }

    #[must_use]
    pub fn text<K: AsHeaderName>(&self, name: K) -> HeaderText<'a> {
        match self.map.get(name) {
            None => HeaderText::Absent,
            Some(value) => value
                .to_str()
                .map_or(HeaderText::Unreadable, HeaderText::Text),
        }
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&'a str> {
        self.text(header::USER_AGENT).ok()
    }

    #[must_use]
    pub fn accept(&self) -> Option<&'a str> {
        self.text(header::ACCEPT).ok()
    }

    #[must_use]
    pub fn host(&self) -> Option<&'a str> {
        self.text(header::HOST).ok()
    }

    /// Raw `Cookie` header, for diagnostics.
    #[must_use]
    pub fn raw_cookie(&self) -> Option<&'a str> {
        self.text(header::COOKIE).ok()
    }

    /// Whether the client reached us over HTTPS through a terminating proxy.
    #[must_use]
    pub fn forwarded_https(&self) -> bool {
        self.text("x-forwarded-proto")
            .ok()
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
    }

    /// Value of cookie `name`, and whether any `Cookie` header was unreadable.
    #[must_use]
    pub fn cookie(&self, name: &str) -> (Option<String>, bool) {
        let mut unreadable = false;
        let readable = self
            .map
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| {
                let text = v.to_str().ok();
                unreadable |= text.is_none();
                text
            })
            .collect::<Vec<_>>();
        (find_cookie(readable, name), unreadable)
    }

    /// Whether the request asks for a protocol upgrade.
    #[must_use]
    pub fn is_upgrade(&self) -> bool {
        let connection_upgrade = self
            .map
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
        connection_upgrade
            && self
                .text(header::UPGRADE)
                .ok()
                .is_some_and(|v| !v.trim().is_empty())
    }

    /// Collects what the verification policy looks at.
    #[must_use]
    pub fn signals(&self, cookie_name: &str, token_header: &str) -> Signals<'a> {
        let (cookie, cookie_unreadable) = self.cookie(cookie_name);
        let token = self.text(token_header);
        let user_agent = self.text(header::USER_AGENT);
        let accept = self.text(header::ACCEPT);
        Signals {
            cookie,
            bot_token: token.ok(),
            user_agent: user_agent.ok(),
            accept: accept.ok(),
            parse_failure: cookie_unreadable
                || token.is_unreadable()
                || user_agent.is_unreadable()
                || accept.is_unreadable(),
        }
    }
}

/// One inbound HTTP request or upgrade attempt, as seen by the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct InboundConnection<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub headers: RequestHeaders<'a>,
    pub kind: TransportKind,
}

impl<'a> InboundConnection<'a> {
    #[must_use]
    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        let headers = RequestHeaders::new(req.headers());
        let kind = if headers.is_upgrade() {
            TransportKind::Upgrade
        } else {
            TransportKind::Http
        };
        Self {
            method: req.method(),
            path: req.uri().path(),
            headers,
            kind,
        }
    }
}
