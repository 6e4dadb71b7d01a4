//! Security enforcement modules.
//!
//! Provides the verification policy, bot-token registry, and egress
//! address allocation.

pub mod address;
pub mod verification;
