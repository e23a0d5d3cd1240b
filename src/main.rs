//! madesk - plays Music Assistant streams on this computer.
//!
//! Runs synchronously: the control session and the receiver own their
//! runtimes on dedicated threads, and `play` builds a small one only to wait
//! for Ctrl-C.

use std::{error::Error, process};

use clap::Parser;
use tracing::{Level, info, span};

use madesk::{
    cli::{Cli, CliService, Commands, formatting::format_error},
    config::SettingsStore,
    tracing_config,
};

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Play { .. }) {
        tracing_config::init_with_file()?;
        let _span = span!(Level::INFO, "madesk_play").entered();
        info!("Starting Sendspin receiver");
        run(cli.command)
    } else {
        tracing_config::init()?;
        run(cli.command)
    }
}

fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    let store = SettingsStore::open_default()?;
    let cli_service = CliService::new(store);

    match cli_service.execute(command) {
        Ok(output) => {
            if !output.trim().is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string()));
            process::exit(1);
        }
    }
}
