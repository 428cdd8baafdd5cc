//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

/// Command-line interface of the flock supervisor.
///
/// The action is a plain word rather than a subcommand so that unknown or
/// missing actions fall back to help instead of a parse error.
#[derive(Debug, Parser)]
#[command(name = "flock")]
#[command(about = "Run and control a pool of worker processes")]
#[command(version)]
pub struct Cli {
    /// JSON settings file
    #[arg(short = 'c', long = "config", env = "FLOCK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// start | stop | restart | reload | status | help
    pub action: Option<String>,
}
