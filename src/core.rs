//! Core system components.
//!
//! Contains the gateway dispatch logic and the middleware around the
//! application handler.

pub mod gateway;
pub mod middleware;
