use anyhow::Result;
use clap::Parser;
use lights_out::cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    cli.run().await
}
