//! Bot token parsing and freshness checks.
//!
//! A bot token is `base64(timestamp_ms ":" random)`. The timestamp bounds the
//! token's lifetime; the whole token is fingerprinted for single use.
//!
//! Tokens are not signed. `BOT_TOKEN_SECRET` only keys the fingerprint, so a
//! client can mint its own token; what a token buys is one admission per
//! freshness window.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 digest identifying a presented token.
pub type Fingerprint = [u8; 32];

/// Why a bot token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("malformed bot token")]
    Malformed,
    #[error("bot token presented too soon after issue")]
    Premature,
    #[error("bot token expired")]
    Expired,
    #[error("bot token already used")]
    Replayed,
}

/// A structurally valid bot token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotToken {
    pub issued_at_ms: u64,
    pub nonce: String,
}

impl BotToken {
    /// Decodes a raw header value.
    ///
    /// # Errors
    ///
    /// Returns `TokenRejection::Malformed` if the value is not base64, not
    /// UTF-8, lacks the `:` separator, has a non-numeric timestamp or an
    /// empty random part.
    pub fn parse(raw: &str) -> Result<Self, TokenRejection> {
        let decoded = STANDARD
            .decode(raw.trim())
            .map_err(|_| TokenRejection::Malformed)?;
        let text = std::str::from_utf8(&decoded).map_err(|_| TokenRejection::Malformed)?;
        let (timestamp, nonce) = text.split_once(':').ok_or(TokenRejection::Malformed)?;
        if nonce.is_empty() {
            return Err(TokenRejection::Malformed);
        }
        let issued_at_ms = timestamp
            .parse()
            .map_err(|_| TokenRejection::Malformed)?;
        Ok(Self {
            issued_at_ms,
            nonce: nonce.to_string(),
        })
    }

    /// Checks the token age against `[min_age_ms, max_age_ms]`.
    ///
    /// # Errors
    ///
    /// Returns `Premature` for tokens younger than `min_age_ms` (including
    /// timestamps in the future) and `Expired` for tokens older than `max_age_ms`.
    pub fn check_age(
        &self,
        now_ms: u64,
        min_age_ms: u64,
        max_age_ms: u64,
    ) -> Result<(), TokenRejection> {
        let Some(age) = now_ms.checked_sub(self.issued_at_ms) else {
            return Err(TokenRejection::Premature);
        };
        if age < min_age_ms {
            return Err(TokenRejection::Premature);
        }
        if age > max_age_ms {
            return Err(TokenRejection::Expired);
        }
        Ok(())
    }

    /// Encodes a token the way clients are expected to build one.
    #[must_use]
    pub fn encode(issued_at_ms: u64, nonce: &str) -> String {
        STANDARD.encode(format!("{issued_at_ms}:{nonce}"))
    }
}

/// Hashes raw tokens into registry keys.
#[derive(Clone)]
pub struct Fingerprinter {
    secret: Option<Vec<u8>>,
}

impl Fingerprinter {
    #[must_use]
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret.map(|s| s.as_bytes().to_vec()),
        }
    }

    /// Fingerprints the raw header value, keyed by the shared secret when set.
    ///
    /// # Panics
    ///
    /// Panics if HMAC initialization fails (invalid key length), though HMAC
    /// accepts keys of any size.
    #[must_use]
    pub fn fingerprint(&self, raw: &str) -> Fingerprint {
        let raw = raw.trim().as_bytes();
        let mut out = [0u8; 32];
        match &self.secret {
            Some(secret) => {
                let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
                    .expect("HMAC accepts any key size");
                mac.update(raw);
                out.copy_from_slice(&mac.finalize().into_bytes());
            }
            None => {
                out.copy_from_slice(&Sha256::digest(raw));
            }
        }
        out
    }
}
