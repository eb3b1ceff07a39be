//! Scorecast CLI library
//!
//! Argument parsing, configuration, and the command shell that drives a
//! [`scorecast_runtime::GameClient`] from standard input.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod shell;

pub use cli::Cli;
pub use commands::{CommandDispatcher, ShellCommand, UsageError};
pub use config::AppConfig;
pub use error::{CliError, Result};
