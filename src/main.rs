use anyhow::Result;
use clap::Parser;
use happy_new_year::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}
