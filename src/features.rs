//! Stock downstream handlers.
//!
//! An HTTP/1.1 forwarder for external bare and WISP servers, and a static
//! site server for the application fallback.

pub mod static_site;
pub mod upstream;

pub use static_site::StaticSite;
pub use upstream::{EGRESS_HEADER, UpstreamForwarder};
