//! Command-line interface for the headless player.
//!
//! Arguments are parsed with clap; each subcommand maps to one function in
//! `commands` that returns its output as a string.

mod commands;
pub mod formatting;
mod service;
mod types;

use clap::{Parser, Subcommand};

pub use commands::control::parse_position;
pub use service::CliService;
pub use types::{CliError, CommandResult};

/// Music Assistant desktop audio receiver
#[derive(Parser, Debug)]
#[command(name = "madesk", version)]
#[command(about = "Play Music Assistant streams on this computer")]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the Sendspin receiver until interrupted
    Play {
        /// Music Assistant server URL, overrides the saved one
        #[arg(short, long)]
        server: Option<String>,
        /// Local output id to play through
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List local audio outputs and the formats they accept
    Outputs,
    /// List Music Assistant players
    Players {
        /// Music Assistant server URL, overrides the saved one
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Control playback on a Music Assistant player
    Control {
        /// Transport action
        #[command(subcommand)]
        action: ControlAction,
        /// Player to control, defaults to the saved output player
        #[arg(short, long, global = true)]
        player: Option<String>,
        /// Music Assistant server URL, overrides the saved one
        #[arg(short, long, global = true)]
        server: Option<String>,
    },
}

/// Transport actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    /// Pause the active queue
    Pause,
    /// Resume the active queue
    Resume,
    /// Skip to the next track
    Next,
    /// Go back to the previous track
    Previous,
    /// Jump to a position (seconds or mm:ss)
    Seek {
        /// Target position
        position: String,
    },
    /// Set the player volume in percent
    Volume {
        /// Volume, 0-100
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
}

#[cfg(test)]
mod tests;
