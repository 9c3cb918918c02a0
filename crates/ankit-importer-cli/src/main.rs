//! `ankit-import`: generate Anki notes from folders of study images.

mod cli;
mod commands;

use clap::Parser;

use crate::cli::{Cli, Command};
use crate::commands::Session;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    let mut session = Session::load(cli.config.as_deref(), cli.anki_url)?;

    match cli.command {
        Command::Import(args) => commands::import(&mut session, args).await?,
        Command::Profiles { command } => commands::profiles(&mut session, command)?,
        Command::Models => commands::models(&session).await?,
        Command::Check => commands::check(&session).await?,
        Command::Config { command } => commands::config(&mut session, command)?,
    }

    Ok(())
}
