//! Command-line interface definition for cwlogs-tail
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to run the tailer, check a configuration, and
//! inspect stored cursors.

use clap::{Parser, Subcommand};

/// cwlogs-tail - Tail AWS CloudWatch Logs streams
///
/// Polls a log group on a fixed interval, remembers where each stream was
/// left off, and writes decoded records to STDOUT as JSON lines.
#[derive(Parser, Debug, Clone)]
#[command(name = "cwlogs-tail")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/cwlogs-tail.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for cwlogs-tail
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Poll the configured log group until interrupted
    Run {
        /// Run a single poll cycle and exit
        #[arg(long)]
        once: bool,

        /// Keep cursors in memory only; the stored state is not modified
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration and print the effective settings
    Check,

    /// Show the stored cursor of a stream
    Cursor {
        /// Stream name; omit for the whole-group cursor
        #[arg(short, long)]
        stream: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/cwlogs-tail.yaml".to_string()),
            verbose: false,
            command: Commands::Check,
        }
    }
}
