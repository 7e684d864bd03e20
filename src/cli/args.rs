//! CLI argument definitions using clap
//!
//! Commands:
//! - aerodb-docstats init --config <path>
//! - aerodb-docstats serve --config <path> [--port <port>]
//! - aerodb-docstats scan --config <path> --min-size-kb <N>
//! - aerodb-docstats put --config <path> --key <key> [--data <s>] [--metadata <s>]
//! - aerodb-docstats delete --config <path> --key <key>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerodb-docstats - find the largest documents in a table
#[derive(Parser, Debug)]
#[command(name = "aerodb-docstats")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodb.json")]
        config: PathBuf,
    },

    /// Serve the size report over HTTP
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodb.json")]
        config: PathBuf,

        /// Overrides `http.port` from the configuration
        #[arg(long)]
        port: Option<u16>,
    },

    /// Write one size report to stdout
    Scan {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodb.json")]
        config: PathBuf,

        /// Report documents larger than this many KiB
        #[arg(long)]
        min_size_kb: String,
    },

    /// Store a document
    Put {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodb.json")]
        config: PathBuf,

        #[arg(long)]
        key: String,

        /// Data column; omitted means absent
        #[arg(long)]
        data: Option<String>,

        /// Metadata column; omitted means absent
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Delete a document
    Delete {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodb.json")]
        config: PathBuf,

        #[arg(long)]
        key: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
