//! Integration test common infrastructure.
//!
//! Provides a fully wired engine (storage, streams, notifier, bus consumers
//! and request pool) plus helpers for publishing producer messages.

pub mod engine;
pub mod messages;

#[allow(unused_imports)]
pub use engine::TestEngine;
