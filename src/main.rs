use anyhow::Result;
use kidchat::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
