//! Browser and bot-token verification.
//!
//! One policy shared by the connection dispatcher and the application gate.

mod browser;
mod policy;
mod registry;
mod token;

pub use browser::BrowserMatcher;
pub use policy::{Assessment, Signals, SoftFailure, VerificationDecision, VerificationPolicy};
pub use registry::{SingleUseTokenRegistry, spawn_sweeper};
pub use token::{BotToken, Fingerprint, Fingerprinter, TokenRejection};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
