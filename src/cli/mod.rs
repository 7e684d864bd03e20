//! CLI module for aerodb-docstats
//!
//! Provides command-line interface for:
//! - init: Create the data directory and an empty table
//! - serve: Serve the size report over HTTP
//! - scan: One-shot size report to stdout
//! - put / delete: Maintain documents

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{delete, init, open_storage, put, run, run_command, scan, serve};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_response, write_response_to};
