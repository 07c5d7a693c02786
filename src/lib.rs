//! syncd-ng - incremental sync engine for federated chat servers.
//!
//! Tracks nine independently advancing categories of per-user and per-room
//! state, composes them into one resumable [`StreamingToken`], and lets
//! long-poll requests block until something relevant is newer than the
//! client's token.
//!
//! [`StreamingToken`]: syncd_proto::StreamingToken

pub mod bus;
pub mod config;
pub mod consumers;
pub mod db;
pub mod error;
pub mod http;
pub mod metrics;
pub mod notifier;
pub mod state;
pub mod streams;
pub mod sync;
pub mod telemetry;
