//! gmailsort - sorts Gmail messages into labels named after sender domains
//!
//! This is the main entry point for the gmailsort command line tool.

use std::process::ExitCode;

use clap::Parser;
use log::error;

mod analyze;
mod call;
mod cli;
mod find;
mod session;

use cli::{Cli, Command};
use session::Session;

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let session = Session::open(&cli.profile, &cli.credentials)?;
    match &cli.command {
        Command::Analyze(args) => analyze::run(&session, args),
        Command::Find(args) => find::run(&session, args),
        Command::Call(args) => call::run(&session, args),
    }
}
