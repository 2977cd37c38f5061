//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (get, set, list, path)
//! - [`simulate`] - Drive the request arbiter against a simulated sensor

pub mod config;
pub mod simulate;
