//! HTTP response utilities.
//!
//! Provides the shared body type and helpers for the responses the gateway
//! writes itself: plain-text refusals and HTML challenge pages.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Response, StatusCode};
use tracing::warn;

/// Body type of every response leaving the gateway.
pub type GatewayBody = BoxBody<Bytes, hyper::Error>;

#[must_use]
pub fn empty() -> GatewayBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

#[must_use]
pub fn full<T: Into<Bytes>>(chunk: T) -> GatewayBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Builds a plain-text response.
#[must_use]
pub fn plain_text(status: StatusCode, text: &'static str) -> Response<GatewayBody> {
    let mut response = Response::new(full(text));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(text.len()));
    inject_security_headers(headers);
    response
}

/// The terse refusal for clients failing verification.
#[must_use]
pub fn forbidden() -> Response<GatewayBody> {
    plain_text(StatusCode::FORBIDDEN, "Forbidden")
}

/// Builds an uncached HTML response, optionally setting a cookie.
#[must_use]
pub fn html(status: StatusCode, html: String, set_cookie: Option<&str>) -> Response<GatewayBody> {
    let len = html.len();
    let mut response = Response::new(full(html));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    if let Some(cookie) = set_cookie {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.insert(header::SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Dropping unencodable Set-Cookie header"),
        }
    }

    inject_security_headers(headers);
    response
}

/// Adds the security headers carried by every gateway-generated response.
pub fn inject_security_headers(headers: &mut HeaderMap) {
    headers.remove(header::SERVER);
    headers.remove("X-Powered-By");

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("SAMEORIGIN"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; img-src 'self' data:; \
             base-uri 'none'; form-action 'self'",
        ),
    );
    headers.insert(
        "Cross-Origin-Resource-Policy",
        HeaderValue::from_static("same-origin"),
    );
}
