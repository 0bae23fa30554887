//! Tally - budget status service
//!
//! HTTP surface, configuration and server wiring around `tally-core`.
//! The binary in `main.rs` adds the CLI on top.

#![forbid(unsafe_code)]

pub mod api;
pub mod middleware;
pub mod server;
