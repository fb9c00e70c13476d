//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Session message log inspector.
///
/// Reads text and binary message logs recorded during training sessions,
/// converts binary logs to text, and reports on their contents.
#[derive(Debug, Parser)]
#[command(name = "msglog", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a binary log to a human-readable text log.
    Convert {
        /// Binary log (`.protobuf.bin` or `.protobuf.bin.logPatch`).
        file: PathBuf,

        /// Output path (defaults to `<name>_converted.log` next to the input).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report whether files are message logs.
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Summarize logs, or every log in a directory.
    Summary {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the messages of a log as JSON lines.
    Messages {
        file: PathBuf,

        /// Only messages of this type.
        #[arg(long = "type", value_name = "TYPE")]
        message_type: Option<String>,

        /// First line (or record) to read.
        #[arg(long, default_value_t = 0)]
        from: usize,

        /// Line (or record) to stop before.
        #[arg(long)]
        until: Option<usize>,
    },

    /// Time interesting messages against their replies.
    Events {
        file: PathBuf,

        /// Index of the first message to examine.
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Message type that ends the scan.
        #[arg(long)]
        stop_scanning: String,

        /// Reply type that stops an event's timer.
        #[arg(long)]
        stop_timer: String,

        /// Message types that start events.
        #[arg(long, value_delimiter = ',', required = true)]
        interesting: Vec<String>,

        /// Output as JSON lines.
        #[arg(long)]
        json: bool,
    },
}
