//! Rota CLI library.
//!
//! This crate provides the command-line attendance dashboard.

mod cli;
pub mod commands;
mod config;

pub use cli::{BoardArgs, Cli, Commands, DayArgs};
pub use config::Config;
