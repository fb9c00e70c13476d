//! Session message log CLI library.
//!
//! This crate provides the CLI interface for inspecting and converting
//! message logs.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
