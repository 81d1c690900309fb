//! `call`: raw Gmail API calls addressed by verb

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use log::error;
use mailsort::commands::parse_argument;
use mailsort::{CallArgs, CallTable, MailService};
use serde_json::Value;

use crate::cli::CallCommand;
use crate::session::Session;

pub fn run(session: &Session, args: &CallCommand) -> Result<()> {
    let table = CallTable::default();
    let remote: &dyn MailService = &*session.client;

    let Some(verb) = &args.verb else {
        return interactive(&table, remote);
    };

    let call_args = args
        .args
        .iter()
        .map(|word| parse_argument(word))
        .collect::<mailsort::Result<CallArgs>>()?;
    let response = table.execute(remote, verb, &call_args)?;
    print_json(&response)
}

/// Read one call per line from standard input until end of input
fn interactive(table: &CallTable, remote: &dyn MailService) -> Result<()> {
    let verbs: Vec<&str> = table.verbs().collect();
    println!("Available calls: {}", verbs.join(", "));
    println!("Type Ctrl-D to quit");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!(">>> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        let line = line.context("Failed to read from standard input")?;
        if line.trim().is_empty() {
            continue;
        }

        match table.execute_line(remote, &line) {
            Ok(response) => print_json(&response)?,
            Err(e) => error!("{}", e),
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
