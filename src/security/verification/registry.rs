//! Single-use registry for bot token fingerprints.
//!
//! Remembers every accepted token for a fixed retention window. Entries
//! expire by time only: lazily when the same fingerprint shows up again, and
//! in bulk through [`SingleUseTokenRegistry::evict_expired`].

use crate::security::verification::token::Fingerprint;
use papaya::{Compute, HashMap, Operation};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct SingleUseTokenRegistry {
    seen: HashMap<Fingerprint, u64>,
    retention_ms: u64,
}

impl SingleUseTokenRegistry {
    /// Creates an empty registry keeping fingerprints for `retention_ms`.
    #[must_use]
    pub fn new(retention_ms: u64) -> Self {
        Self {
            seen: HashMap::new(),
            retention_ms,
        }
    }

    /// Records `fingerprint` as spent at `now_ms`.
    ///
    /// Returns `false` if it was already spent within the retention window.
    /// The check and the insert happen in one atomic step, so concurrent
    /// presentations of the same token cannot both succeed.
    pub fn try_consume(&self, fingerprint: Fingerprint, now_ms: u64) -> bool {
        let retention_ms = self.retention_ms;
        let seen = self.seen.pin();
        let outcome = seen.compute(fingerprint, |entry| match entry {
            Some((_, &seen_at)) if now_ms.saturating_sub(seen_at) < retention_ms => {
                Operation::Abort(())
            }
            _ => Operation::Insert(now_ms),
        });
        !matches!(outcome, Compute::Aborted(()))
    }

    /// Whether `fingerprint` is currently remembered as spent.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint, now_ms: u64) -> bool {
        self.seen
            .pin()
            .get(fingerprint)
            .is_some_and(|&seen_at| now_ms.saturating_sub(seen_at) < self.retention_ms)
    }

    /// Drops every entry older than the retention window. Returns how many went.
    pub fn evict_expired(&self, now_ms: u64) -> usize {
        let seen = self.seen.pin();
        let before = seen.len();
        seen.retain(|_, &seen_at| now_ms.saturating_sub(seen_at) < self.retention_ms);
        before.saturating_sub(seen.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.pin().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Starts a background task evicting expired fingerprints every `interval`.
pub fn spawn_sweeper(registry: Arc<SingleUseTokenRegistry>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = registry.evict_expired(super::now_ms());
            if evicted > 0 {
                debug!(
                    evicted,
                    remaining = registry.len(),
                    "Expired bot token fingerprints evicted"
                );
            }
        }
    })
}
