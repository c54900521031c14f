//! Lendbank RPC - API/CLI orchestrator
//!
//! This crate provides the CLI binary, configuration loading and the
//! `AppContext` that runs every lending operation end to end.

pub mod commands;
pub mod config;
pub mod context;
pub mod error;

pub use config::{ConfigError, LendingConfig};
pub use context::{AppContext, Capabilities};
pub use error::LendingError;
