//! MPD Control - async client for the Music Player Daemon protocol
//!
//! This library provides:
//! - Response framing and `ACK` error parsing
//! - Shape inference from the flat `key: value` stream (scalar, record, list, named groups)
//! - A serialized command runner with one typed method per protocol verb
//! - Command lists
//! - An idle session that drains coalesced change notifications on local links
//! - An idle watcher publishing changes on a broadcast event bus

pub mod bus;
pub mod client;
pub mod config;
pub mod protocol;
pub mod transport;

pub use client::{ClientSettings, IdleOutcome, MpdClient, Verb};
pub use protocol::{AckError, MpdError, ParsedValue};
