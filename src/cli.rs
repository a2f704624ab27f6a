//! Command-line argument parsing for the toolbridge host utility

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// toolbridge - launch, inspect and call RPC tool plugins
#[derive(Parser, Debug)]
#[command(name = "toolbridge")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a plugin.yaml and print its compiled parameter schema
    Validate {
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
    },

    /// Launch a plugin and report every capability it advertises
    Inspect {
        #[arg(value_name = "EXECUTABLE")]
        executable: String,
    },

    /// Launch a plugin and call its tool once
    Call {
        #[arg(value_name = "EXECUTABLE")]
        executable: String,

        /// Argument object as JSON
        #[arg(value_name = "ARGS", default_value = "{}")]
        args: String,

        /// Attach a file (repeatable); unsupported types are dropped
        #[arg(short, long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,

        /// Per-request timeout in seconds
        #[arg(short, long, default_value_t = 60)]
        timeout: u64,
    },

    /// List the plugins in a host configuration
    List {
        /// Host configuration file
        #[arg(short, long, value_name = "FILE", env = "TOOLBRIDGE_CONFIG")]
        config: PathBuf,

        /// Start every enabled plugin and report health
        #[arg(long)]
        start: bool,
    },
}
