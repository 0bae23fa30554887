//! Server module for Tally
//!
//! Contains the main server initialization and runtime logic.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Configuration validation
//! - `init`: Service wiring, router construction and the run loop

pub mod config;
mod init;
mod loader;
mod validation;

// Re-export public API
pub use init::{build_router, build_services, cors_layer, run, AppServices};
pub use loader::{environment, is_production, load_config};
pub use validation::validate_config;
