//! Plain-text rendering of thread views.

pub mod thread;
