//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, show, init)
//! - [`simulate`] - Scripted placement session against simulated AR primitives

pub mod config;
pub mod simulate;
