//! Mock servers for client integration testing
//!
//! The mock MPD simulates the daemon closely enough for full round trips
//! over a real socket without a running MPD.
#![allow(dead_code)]

pub mod mpd;
