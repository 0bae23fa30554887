//! Middleware module for Tally HTTP server
//!
//! Provides:
//! - Identity extractors (bearer token payload, quota key)
//! - Chart quota enforcement

pub mod chart_quota;
pub mod identity;
