//! Command line interface built on clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Generate short posts with Gemini, publish them to X on a schedule and
/// report every run by email.
#[derive(Debug, Parser)]
#[command(name = "autopost", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, env = "AUTOPOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scheduler until interrupted.
    Run,

    /// Run the publication job once, right now.
    Once,

    /// Generate a post and print it with a share link, without publishing.
    Generate {
        /// Do not feed the history log into the prompt.
        #[arg(long)]
        no_history: bool,
    },

    /// Show the upcoming scheduled firings.
    Next {
        /// How many firings to list.
        #[arg(long, short = 'n', default_value_t = 5)]
        count: usize,
    },
}
