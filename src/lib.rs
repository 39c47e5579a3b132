//! threadline library crate.

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
#[cfg(feature = "harness")]
pub mod fixtures;
#[cfg(feature = "harness")]
pub mod harness;
pub mod render;
pub mod session;
pub mod sync;
