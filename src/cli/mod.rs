use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

pub mod chat;

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session with the companion
    Chat {},
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();

    // Chat is the default when no sub command is given
    match args.command {
        Some(Command::Chat {}) | None => {
            chat::run().await?;
        }
    }

    Ok(())
}
