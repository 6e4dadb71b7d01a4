//! Pages served by the gateway itself.

pub mod ui;
