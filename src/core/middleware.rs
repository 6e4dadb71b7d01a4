//! Middleware components.
//!
//! Includes verification cookie handling and the application gate.

mod app_gate;
mod cookies;

pub use app_gate::AppGate;
pub use cookies::{find_cookie, format_set_cookie};
