//! uidriver - black-box UI automation for Android apps
//!
//! Runs the built-in change-text suite or YAML scenarios against a device
//! reached through adb, and exposes the single driver operations as
//! commands for poking at a screen by hand.

use clap::Parser;
use uidriver::commands::{Commands, GlobalOptions};
use uidriver::{cli, common::logging};

#[derive(Parser)]
#[command(name = "uidriver", about = "Black-box UI automation for Android apps")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Suite runs also log to the session file; the guard flushes it on exit
    let guard = if cli.command.is_session() {
        let (_, guard) = logging::init_session(cli.options.verbose);
        guard
    } else {
        logging::init_cli(cli.options.verbose);
        None
    };

    let result = cli::dispatch(cli.command, cli.options).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        drop(guard);
        std::process::exit(1);
    }
}
