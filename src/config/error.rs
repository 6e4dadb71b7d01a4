//! Error types and result aliases.
//!
//! Defines the core `GatewayError` enumeration and common `Result` type.

use thiserror::Error;

/// Gateway errors.
///
/// Verification failures are not errors; they surface as a
/// [`VerificationDecision`](crate::security::verification::VerificationDecision).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid egress address block.
    #[error("invalid address block: {0}")]
    AddressBlock(String),

    /// Socket level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP protocol failure.
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    /// Upstream proxy or WISP server failure.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The connection was closed without a response.
    #[error("connection dropped")]
    ConnectionDropped,
}

/// Result type alias for `GatewayError`.
pub type Result<T> = std::result::Result<T, GatewayError>;
